//! Generative co-pilot: product configs, strategic hypotheses and chat.
//!
//! Product config generation is a hard dependency of regeneration and
//! returns errors. Hypotheses and chat are advisory: their failures are
//! logged and degrade to an empty set or [`CHAT_FALLBACK`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::gateway::{
    Attribution, ChatGateway, ChatModel, ChatRequest, ChatResponse, ProviderError,
};
use crate::prompts::{
    copilot_prompt, hypothesis_prompt, hypothesis_schema, product_config_schema, taxonomy_prompt,
    PromptInstance,
};
use crate::taxonomy::{ProductConfig, Taxonomy, TaxonomyError};

/// Reply returned by [`Copilot::chat`] when the backend call fails.
pub const CHAT_FALLBACK: &str = "Sorry, the connection to the server was lost.";

/// Model used when `VALUE_SPACE_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hypothesis {
    #[serde(default)]
    pub text: String,
}

/// Hypotheses for one cluster, three per category by convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisSet {
    #[serde(default)]
    pub quick_wins: Vec<Hypothesis>,
    #[serde(default)]
    pub balanced: Vec<Hypothesis>,
    #[serde(default)]
    pub revolutionary: Vec<Hypothesis>,
}

impl HypothesisSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.quick_wins.len() + self.balanced.len() + self.revolutionary.len()
    }

    fn without_blank(mut self) -> Self {
        for list in [
            &mut self.quick_wins,
            &mut self.balanced,
            &mut self.revolutionary,
        ] {
            list.retain(|h| !h.text.trim().is_empty());
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CopilotError {
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("empty response from model")]
    EmptyResponse,
    #[error("JSON extraction failed: {0}")]
    JsonParse(String),
    #[error("generated taxonomy is invalid: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one call including gateway retries.
    pub request_timeout: Duration,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 16_384,
            request_timeout: Duration::from_secs(90),
        }
    }
}

impl CopilotConfig {
    /// Defaults, with the model overridden by `VALUE_SPACE_MODEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("VALUE_SPACE_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// =============================================================================
// Copilot
// =============================================================================

#[derive(Clone)]
pub struct Copilot {
    gateway: Arc<dyn ChatGateway>,
    config: CopilotConfig,
    session_id: Option<Uuid>,
    run_id: Option<Uuid>,
}

impl Copilot {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: CopilotConfig) -> Self {
        Self {
            gateway,
            config,
            session_id: None,
            run_id: None,
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attribute later calls to the generation run they are about.
    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn config(&self) -> &CopilotConfig {
        &self.config
    }

    fn request(&self, prompt: &PromptInstance, caller: &'static str) -> ChatRequest {
        let mut attribution = Attribution::new(caller);
        if let Some(id) = self.session_id {
            attribution = attribution.with_session(id);
        }
        if let Some(id) = self.run_id {
            attribution = attribution.with_run(id);
        }
        ChatRequest::new(
            ChatModel::new(&self.config.model),
            prompt.to_messages(),
            attribution,
        )
        .temperature(self.config.temperature)
        .max_tokens(self.config.max_tokens)
    }

    async fn call(&self, req: ChatRequest) -> Result<ChatResponse, CopilotError> {
        let resp = tokio::time::timeout(self.config.request_timeout, self.gateway.chat(req))
            .await
            .map_err(|_| CopilotError::Timeout(self.config.request_timeout))??;
        if resp.content.trim().is_empty() {
            return Err(CopilotError::EmptyResponse);
        }
        Ok(resp)
    }

    /// Ask the backend for a product config describing `description`.
    pub async fn generate_product_config(
        &self,
        description: &str,
    ) -> Result<ProductConfig, CopilotError> {
        let prompt = taxonomy_prompt(description);
        let req = self
            .request(&prompt, "copilot::taxonomy")
            .with_schema("product_config", product_config_schema());
        let resp = self.call(req).await?;
        let config: ProductConfig = parse_json(&resp.content)?;
        info!(
            product = %config.product_name,
            clusters = config.clusters.len(),
            latency_ms = resp.latency.as_millis() as u64,
            "generated product config"
        );
        Ok(config)
    }

    /// [`Self::generate_product_config`] followed by validation.
    pub async fn generate_taxonomy(&self, description: &str) -> Result<Taxonomy, CopilotError> {
        let config = self.generate_product_config(description).await?;
        Ok(config.into_taxonomy()?)
    }

    /// Hypotheses for a cluster, with errors.
    pub async fn try_generate_hypotheses(
        &self,
        cluster_name: &str,
        product_name: &str,
    ) -> Result<HypothesisSet, CopilotError> {
        let prompt = hypothesis_prompt(cluster_name, product_name);
        let req = self
            .request(&prompt, "copilot::hypotheses")
            .with_schema("hypotheses", hypothesis_schema());
        let resp = self.call(req).await?;
        let set: HypothesisSet = parse_json(&resp.content)?;
        Ok(set.without_blank())
    }

    /// Hypotheses for a cluster; empty on any failure.
    pub async fn generate_hypotheses(&self, cluster_name: &str, product_name: &str) -> HypothesisSet {
        match self.try_generate_hypotheses(cluster_name, product_name).await {
            Ok(set) => set,
            Err(err) => {
                warn!(cluster = cluster_name, error = %err, "hypothesis generation failed");
                HypothesisSet::default()
            }
        }
    }

    /// Free-text co-pilot reply; [`CHAT_FALLBACK`] on any failure.
    pub async fn chat(&self, message: &str, context: &str) -> String {
        let prompt = copilot_prompt(message, context);
        let req = self.request(&prompt, "copilot::chat");
        match self.call(req).await {
            Ok(resp) => resp.content.trim().to_string(),
            Err(err) => {
                warn!(error = %err, "co-pilot chat failed");
                CHAT_FALLBACK.to_string()
            }
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, CopilotError> {
    serde_json::from_str(extract_json(raw)).map_err(|e| {
        let preview: String = raw.chars().take(300).collect();
        CopilotError::JsonParse(format!("{e}; raw: {preview}"))
    })
}

// =============================================================================
// JSON extraction
// =============================================================================

/// Extract a JSON object from potentially noisy model output.
///
/// Handles:
/// - Pure JSON responses
/// - JSON wrapped in markdown code fences
/// - JSON embedded in prose
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            return &trimmed[..end];
        }
    }

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        if let Some(end) = find_matching_brace(remainder) {
            return &remainder[..end];
        }
    }

    trimmed
}

/// Byte offset just past the matching closing brace, ignoring braces inside
/// JSON strings.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_from_fenced_prose() {
        let input = "Here you go:\n```json\n{\"quickWins\": [{\"text\": \"a {b}\"}]}\n```";
        assert_eq!(extract_json(input), "{\"quickWins\": [{\"text\": \"a {b}\"}]}");
    }

    #[test]
    fn extract_json_handles_escaped_quotes() {
        let input = r#"{"text": "say \"hi\" {now}"}"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn extract_json_passes_through_unbalanced_input() {
        assert_eq!(extract_json("  not json { "), "not json {");
    }

    #[test]
    fn hypothesis_set_tolerates_missing_lists_and_blanks() {
        let set: HypothesisSet =
            parse_json(r#"{"quickWins": [{"text": "We believe that X"}, {"text": " "}]}"#)
                .unwrap();
        let set = set.without_blank();
        assert_eq!(set.quick_wins.len(), 1);
        assert!(set.balanced.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_json_reports_preview() {
        let err = parse_json::<HypothesisSet>("no json here").unwrap_err();
        assert!(matches!(err, CopilotError::JsonParse(msg) if msg.contains("no json here")));
    }
}
