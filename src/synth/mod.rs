//! Procedural generation of clusters and signals from a taxonomy.
//!
//! [`synthesize`] is a pure function of its inputs and the random source:
//! the same taxonomy, config and seed always yield the same generation.

pub mod cluster;
pub mod signal;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::distribution::AXIS_SLOTS;
use crate::impact::{DEFAULT_HIGH_COUNT, DEFAULT_VERY_HIGH_COUNT};
use crate::taxonomy::{Taxonomy, TaxonomyError};

pub use cluster::{Cluster, Hotspot, PALETTE};
pub use signal::{infer_source, Signal, GENERIC_SOURCES};

static NEXT_GENERATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
}

/// Tunables of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of signals.
    pub count: usize,
    /// Number of clusters drawn from a built-in taxonomy.
    pub total_clusters: usize,
    pub very_high_count: usize,
    pub high_count: usize,
    /// Segment slots that attract most hotspots.
    pub dominant_segments: Vec<usize>,
    /// Probability a hotspot segment comes from `dominant_segments`.
    pub dominant_segment_bias: f64,
    /// Half-width of the per-axis uniform index noise.
    pub axis_noise: f64,
    pub drift_probability: f64,
    /// Half-width of the single-axis drift.
    pub drift_span: f64,
    /// Gaussian jitter applied when mapping indices to coordinates.
    pub coordinate_jitter: f64,
    /// Deal slots so every cluster gets at least one signal.
    pub guarantee_coverage: bool,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 3000,
            total_clusters: 45,
            very_high_count: DEFAULT_VERY_HIGH_COUNT,
            high_count: DEFAULT_HIGH_COUNT,
            dominant_segments: vec![1, 3, 4, 8],
            dominant_segment_bias: 0.7,
            axis_noise: 0.5,
            drift_probability: 0.3,
            drift_span: 0.75,
            coordinate_jitter: 0.25,
            guarantee_coverage: true,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_total_clusters(mut self, total: usize) -> Self {
        self.total_clusters = total;
        self
    }

    pub fn with_tiers(mut self, very_high: usize, high: usize) -> Self {
        self.very_high_count = very_high;
        self.high_count = high;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_guarantee_coverage(mut self, guarantee: bool) -> Self {
        self.guarantee_coverage = guarantee;
        self
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.total_clusters == 0 {
            return Err(SynthesisError::InvalidConfig(
                "total_clusters must be at least 1".into(),
            ));
        }
        if let Some(bad) = self.dominant_segments.iter().find(|&&s| s >= AXIS_SLOTS) {
            return Err(SynthesisError::InvalidConfig(format!(
                "dominant segment {bad} is outside 0..{AXIS_SLOTS}"
            )));
        }
        for (name, value) in [
            ("dominant_segment_bias", self.dominant_segment_bias),
            ("drift_probability", self.drift_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SynthesisError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("axis_noise", self.axis_noise),
            ("drift_span", self.drift_span),
            ("coordinate_jitter", self.coordinate_jitter),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SynthesisError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One complete, immutable generation run.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Process-unique id, used as the memoization key for derived views.
    pub id: u64,
    pub run_id: Uuid,
    pub taxonomy: Arc<Taxonomy>,
    pub taxonomy_fingerprint: String,
    pub config: GeneratorConfig,
    pub clusters: Vec<Cluster>,
    pub signals: Vec<Signal>,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn signal(&self, id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn signals_in_cluster<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Signal> {
        self.signals.iter().filter(move |s| s.cluster_name == name)
    }

    /// First cluster record carrying `name`.
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn total_impact(&self) -> f64 {
        self.signals.iter().map(|s| s.impact_score).sum()
    }
}

/// Synthesize a generation, seeding from `config.seed` or from entropy.
pub fn synthesize(
    taxonomy: Arc<Taxonomy>,
    config: &GeneratorConfig,
) -> Result<Generation, SynthesisError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    synthesize_with_rng(&mut rng, taxonomy, config)
}

/// Synthesize a generation from an injected random source.
pub fn synthesize_with_rng<R: Rng + ?Sized>(
    rng: &mut R,
    taxonomy: Arc<Taxonomy>,
    config: &GeneratorConfig,
) -> Result<Generation, SynthesisError> {
    config.validate()?;
    taxonomy.validate()?;

    let clusters = cluster::synthesize_clusters(rng, &taxonomy, config);
    let signals = signal::synthesize_signals(rng, &taxonomy, &clusters, config);

    let generation = Generation {
        id: NEXT_GENERATION_ID.fetch_add(1, Ordering::Relaxed),
        run_id: Uuid::new_v4(),
        taxonomy_fingerprint: taxonomy.fingerprint(),
        taxonomy,
        config: config.clone(),
        clusters,
        signals,
        created_at: Utc::now(),
    };

    debug!(
        generation_id = generation.id,
        fingerprint = %generation.taxonomy_fingerprint,
        clusters = generation.clusters.len(),
        signals = generation.signals.len(),
        roots = generation.signals.iter().filter(|s| s.is_root_cause).count(),
        "synthesized generation"
    );

    Ok(generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::default_taxonomy;

    #[test]
    fn config_deserializes_with_defaults() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{ "count": 120, "seed": 9 }"#).unwrap();
        assert_eq!(config.count, 120);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.total_clusters, 45);
        assert_eq!(config.dominant_segments, vec![1, 3, 4, 8]);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(GeneratorConfig::default().validate().is_ok());
        assert!(GeneratorConfig::default()
            .with_total_clusters(0)
            .validate()
            .is_err());
        let mut config = GeneratorConfig::default();
        config.dominant_segments = vec![10];
        assert!(config.validate().is_err());
        let mut config = GeneratorConfig::default();
        config.drift_probability = 1.5;
        assert!(config.validate().is_err());
        let mut config = GeneratorConfig::default();
        config.axis_noise = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn generation_ids_are_unique() {
        let config = GeneratorConfig::default().with_count(10).with_seed(1);
        let a = synthesize(default_taxonomy(), &config).unwrap();
        let b = synthesize(default_taxonomy(), &config).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.signals, b.signals);
    }

    #[test]
    fn empty_run_is_allowed() {
        let config = GeneratorConfig::default().with_count(0).with_seed(2);
        let generation = synthesize(default_taxonomy(), &config).unwrap();
        assert!(generation.signals.is_empty());
        assert_eq!(generation.clusters.len(), 45);
        assert_eq!(generation.total_impact(), 0.0);
    }
}
