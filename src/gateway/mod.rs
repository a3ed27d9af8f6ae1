//! Provider gateway for chat completions against the generative backend.

pub mod chat_completions;
pub mod error;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use chat_completions::{ChatCompletionsAdapter, ChatProvider};
use usage::{CallStatus, ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Upper bound on any single wait between attempts, including waits
    /// asked for by a `Retry-After` header.
    pub max_retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Wait before retrying after `err` on `attempt`. A provider's
    /// `Retry-After` wins over the backoff when it is longer.
    pub fn retry_delay(&self, err: &ProviderError, attempt: u32) -> Duration {
        let backoff = backoff_delay(self.retry_base_delay, attempt);
        let wanted = match err.retry_after() {
            Some(after) => after.max(backoff),
            None => backoff,
        };
        wanted.min(self.max_retry_delay)
    }
}

pub struct ProviderGateway<U: UsageSinkTrait> {
    adapter: ChatCompletionsAdapter,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let adapter = ChatCompletionsAdapter::from_env()?;
        Ok(Self {
            adapter,
            usage_sink,
            config: GatewayConfig::default(),
        })
    }

    pub fn with_config(
        adapter: ChatCompletionsAdapter,
        usage_sink: Arc<U>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            adapter,
            usage_sink,
            config,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.adapter.chat(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, &resp, attempt, CallStatus::Success, None)
                        .await;
                    return Ok(resp);
                }
                Err(err) => {
                    let code = err.code().to_string();
                    self.record_usage(
                        &req,
                        &ChatResponse::empty(),
                        attempt,
                        CallStatus::Error,
                        Some(code),
                    )
                    .await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = self.config.retry_delay(&err, attempt);
                    warn!(
                        caller = req.attribution.caller,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        request_id = err.request_id().unwrap_or("-"),
                        error = %err,
                        "retrying provider call"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::provider("gateway", "unknown error", false)))
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        attempt: u32,
        status: CallStatus,
        error_code: Option<String>,
    ) {
        let record = ProviderCallRecord::new(
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens, resp.output_tokens)
        .session(req.attribution.session_id)
        .run(req.attribution.run_id)
        .attempt(attempt)
        .latency(resp.latency.as_millis() as u64);

        let record = if status == CallStatus::Error {
            record.error(error_code.unwrap_or_else(|| "provider_error".to_string()))
        } else {
            record
        };

        self.usage_sink.record(record).await;
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at 32x.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u32.pow(attempt.min(5));
    base * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 9), Duration::from_millis(3200));
    }

    #[test]
    fn retry_after_overrides_shorter_backoff_up_to_the_cap() {
        let config = GatewayConfig {
            max_retries: 2,
            retry_base_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_secs(5),
        };
        let limited = |secs| ProviderError::rate_limited(Duration::from_secs(secs), ErrorContext::new());

        assert_eq!(config.retry_delay(&limited(2), 0), Duration::from_secs(2));
        assert_eq!(config.retry_delay(&limited(60), 0), Duration::from_secs(5));
        assert_eq!(
            config.retry_delay(&ProviderError::provider("p", "502", true), 1),
            Duration::from_millis(20)
        );

        let slow_backoff = GatewayConfig {
            retry_base_delay: Duration::from_secs(3),
            ..config
        };
        assert_eq!(slow_backoff.retry_delay(&limited(1), 0), Duration::from_secs(3));
    }
}
