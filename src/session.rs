//! Session state: the current generation snapshot and regeneration.
//!
//! The snapshot is replaced wholesale. Every regenerate request takes a
//! ticket from a monotonic counter; a finished request publishes only if its
//! ticket is still the latest, otherwise its result is discarded. A failed or
//! superseded request never touches the published snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{GroupKey, GroupScore};
use crate::cache::{CacheError, RankingCache};
use crate::copilot::{Copilot, CopilotError, HypothesisSet, CHAT_FALLBACK};
use crate::insight::{cluster_details, copilot_context, ClusterDetails};
use crate::synth::{synthesize, Generation, GeneratorConfig, SynthesisError};
use crate::taxonomy::{ProductConfig, Taxonomy, TaxonomyError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("taxonomy generation failed: {0}")]
    Copilot(#[from] CopilotError),
    #[error("invalid product config: {0}")]
    Taxonomy(#[from] TaxonomyError),
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("request {ticket} superseded by request {latest}")]
    Superseded { ticket: u64, latest: u64 },
    #[error("regeneration cancelled")]
    Cancelled,
    #[error("no co-pilot configured")]
    NoCopilot,
    #[error("session state lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct Session {
    id: Uuid,
    config: GeneratorConfig,
    current: RwLock<Arc<Generation>>,
    latest_ticket: AtomicU64,
    rankings: RankingCache,
    copilot: Option<Arc<Copilot>>,
    hypotheses: Mutex<HashMap<(u64, String), HypothesisSet>>,
}

impl Session {
    /// Start a session with an initial generation from `taxonomy`.
    pub fn new(taxonomy: Arc<Taxonomy>, config: GeneratorConfig) -> Result<Self, SessionError> {
        let generation = synthesize(taxonomy, &config)?;
        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            generation_id = generation.id,
            signals = generation.signals.len(),
            "session started"
        );
        Ok(Self {
            id,
            config,
            current: RwLock::new(Arc::new(generation)),
            latest_ticket: AtomicU64::new(0),
            rankings: RankingCache::new(),
            copilot: None,
            hypotheses: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_copilot(mut self, copilot: Arc<Copilot>) -> Self {
        self.copilot = Some(copilot);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The published generation.
    pub fn current(&self) -> Result<Arc<Generation>, SessionError> {
        let guard = self.current.read().map_err(|_| SessionError::Poisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Memoized ranking of the published generation.
    pub fn rankings(&self, key: GroupKey) -> Result<Arc<Vec<GroupScore>>, SessionError> {
        let generation = self.current()?;
        Ok(self.rankings.get_or_compute(&generation, key)?)
    }

    pub fn cluster_details(&self, name: &str) -> Result<Option<ClusterDetails>, SessionError> {
        let generation = self.current()?;
        Ok(cluster_details(&generation, name))
    }

    /// Take a new request ticket, superseding every older one.
    pub fn begin_request(&self) -> u64 {
        self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Regenerate from a product description via the co-pilot.
    pub async fn regenerate(
        &self,
        description: &str,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<Arc<Generation>, SessionError> {
        let copilot = self
            .copilot
            .as_deref()
            .ok_or(SessionError::NoCopilot)?
            .clone()
            .with_session(self.id);
        let ticket = self.begin_request();
        let outcome = self
            .regenerate_via(&copilot, ticket, description, cancel_flag)
            .await;
        self.log_outcome(ticket, &outcome);
        outcome
    }

    async fn regenerate_via(
        &self,
        copilot: &Copilot,
        ticket: u64,
        description: &str,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<Arc<Generation>, SessionError> {
        let product = copilot.generate_product_config(description).await?;
        check_cancelled(cancel_flag)?;
        self.check_ticket(ticket)?;
        let taxonomy = Arc::new(product.into_taxonomy()?);
        let generation = synthesize(taxonomy, &self.config)?;
        check_cancelled(cancel_flag)?;
        self.publish(ticket, generation)
    }

    /// Regenerate from an already available product config.
    pub fn regenerate_from_config(
        &self,
        product: ProductConfig,
    ) -> Result<Arc<Generation>, SessionError> {
        let ticket = self.begin_request();
        let outcome = product
            .into_taxonomy()
            .map_err(SessionError::from)
            .and_then(|taxonomy| self.regenerate_inner(ticket, Arc::new(taxonomy)));
        self.log_outcome(ticket, &outcome);
        outcome
    }

    /// Regenerate with a new taxonomy value, or the current one again.
    pub fn regenerate_with_taxonomy(
        &self,
        taxonomy: Option<Arc<Taxonomy>>,
    ) -> Result<Arc<Generation>, SessionError> {
        let ticket = self.begin_request();
        let taxonomy = match taxonomy {
            Some(t) => t,
            None => Arc::clone(&self.current()?.taxonomy),
        };
        let outcome = self.regenerate_inner(ticket, taxonomy);
        self.log_outcome(ticket, &outcome);
        outcome
    }

    fn regenerate_inner(
        &self,
        ticket: u64,
        taxonomy: Arc<Taxonomy>,
    ) -> Result<Arc<Generation>, SessionError> {
        let generation = synthesize(taxonomy, &self.config)?;
        self.publish(ticket, generation)
    }

    fn check_ticket(&self, ticket: u64) -> Result<(), SessionError> {
        let latest = self.latest_ticket.load(Ordering::SeqCst);
        if latest != ticket {
            return Err(SessionError::Superseded { ticket, latest });
        }
        Ok(())
    }

    fn publish(&self, ticket: u64, generation: Generation) -> Result<Arc<Generation>, SessionError> {
        let generation = Arc::new(generation);
        let mut memo = self.hypotheses.lock().map_err(|_| SessionError::Poisoned)?;
        {
            let mut guard = self.current.write().map_err(|_| SessionError::Poisoned)?;
            // Checked under the write lock so two finishing requests cannot
            // both publish.
            self.check_ticket(ticket)?;
            *guard = Arc::clone(&generation);
        }
        memo.retain(|(id, _), _| *id == generation.id);
        drop(memo);
        self.rankings.retain_generation(generation.id)?;
        Ok(generation)
    }

    fn log_outcome(&self, ticket: u64, outcome: &Result<Arc<Generation>, SessionError>) {
        match outcome {
            Ok(generation) => info!(
                session_id = %self.id,
                ticket,
                generation_id = generation.id,
                product = %generation.taxonomy.product_name,
                clusters = generation.clusters.len(),
                signals = generation.signals.len(),
                "published generation"
            ),
            Err(SessionError::Superseded { latest, .. }) => warn!(
                session_id = %self.id,
                ticket,
                latest,
                "discarded stale generation"
            ),
            Err(err) => warn!(
                session_id = %self.id,
                ticket,
                error = %err,
                "regeneration failed, keeping previous generation"
            ),
        }
    }

    /// Hypotheses for a cluster of the published generation, memoized per
    /// generation. Empty without a co-pilot or on failure.
    pub async fn hypotheses(&self, cluster_name: &str) -> Result<HypothesisSet, SessionError> {
        let generation = self.current()?;
        let key = (generation.id, cluster_name.to_string());
        if let Some(hit) = self.memoized_hypotheses(&key)? {
            return Ok(hit);
        }
        let Some(copilot) = self.copilot_for(&generation) else {
            return Ok(HypothesisSet::default());
        };

        let set = copilot
            .generate_hypotheses(cluster_name, &generation.taxonomy.product_name)
            .await;
        if !set.is_empty() {
            let mut memo = self.hypotheses.lock().map_err(|_| SessionError::Poisoned)?;
            memo.insert(key, set.clone());
        }
        Ok(set)
    }

    /// The co-pilot, attributed to this session and `generation`'s run.
    fn copilot_for(&self, generation: &Generation) -> Option<Copilot> {
        let copilot = self.copilot.as_deref()?.clone();
        Some(copilot.with_session(self.id).with_run(generation.run_id))
    }

    fn memoized_hypotheses(
        &self,
        key: &(u64, String),
    ) -> Result<Option<HypothesisSet>, SessionError> {
        let memo = self.hypotheses.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(memo.get(key).cloned())
    }

    /// Co-pilot reply about a cluster. Falls back to the fixed apology when
    /// the co-pilot is missing or fails.
    pub async fn chat(&self, cluster_name: &str, message: &str) -> Result<String, SessionError> {
        let generation = self.current()?;
        let Some(copilot) = self.copilot_for(&generation) else {
            return Ok(CHAT_FALLBACK.to_string());
        };
        let Some(details) = cluster_details(&generation, cluster_name) else {
            return Ok(copilot.chat(message, "").await);
        };
        let known = self.memoized_hypotheses(&(generation.id, cluster_name.to_string()))?;
        let context = copilot_context(
            &generation.taxonomy.product_name,
            &details,
            known.as_ref(),
        );
        Ok(copilot.chat(message, &context).await)
    }
}

fn check_cancelled(cancel_flag: Option<&AtomicBool>) -> Result<(), SessionError> {
    match cancel_flag {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(SessionError::Cancelled),
        _ => Ok(()),
    }
}
