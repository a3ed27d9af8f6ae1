#![forbid(unsafe_code)]

//! # value-space
//!
//! Synthetic product value space: customer signals placed in a discrete
//! 10×10×10 cube of job × context × segment, grouped into problem clusters
//! with a rank-based impact hierarchy.
//!
//! The engine synthesizes a generation from a taxonomy (built in, or produced
//! by a generative backend from a product description), ranks groups by
//! summed impact, and answers filter queries: per-signal visibility, the
//! highlight region of the active filter, and intra-job connection edges.
//! A co-pilot layer asks the backend for product configs, strategic
//! hypotheses and free-text answers about a cluster.

pub mod aggregate;
pub mod cache;
pub mod copilot;
pub mod dashboard;
pub mod distribution;
pub mod filter;
pub mod gateway;
pub mod impact;
pub mod insight;
pub mod prompts;
pub mod session;
pub mod synth;
pub mod taxonomy;
pub mod view;

pub use aggregate::{aggregate, GroupKey, GroupScore};
pub use cache::RankingCache;
pub use copilot::{Copilot, CopilotConfig, CopilotError, HypothesisSet};
pub use filter::{connections, Connection, FilterState, Region, Visibility};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use impact::{classify_impact, ImpactLevel};
pub use insight::{cluster_details, related_signals, ClusterDetails};
pub use session::{Session, SessionError};
pub use synth::{synthesize, Cluster, Generation, GeneratorConfig, Signal, SynthesisError};
pub use taxonomy::{default_taxonomy, Axis, JourneyStage, ProductConfig, Taxonomy, TaxonomyError};
pub use view::{render_points, RenderPoint, Selection};
