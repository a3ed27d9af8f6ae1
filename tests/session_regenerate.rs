use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use value_space::copilot::{Copilot, CopilotConfig, CHAT_FALLBACK};
use value_space::gateway::{ChatGateway, ChatRequest, ChatResponse, FinishReason, ProviderError};
use value_space::session::{Session, SessionError};
use value_space::{default_taxonomy, GeneratorConfig, GroupKey};

/// Scripted backend: answers by caller, with per-call delays.
struct ScriptedGateway {
    calls: AtomicUsize,
    hypothesis_calls: AtomicUsize,
    delays: Vec<Duration>,
    fail_taxonomy: bool,
}

impl ScriptedGateway {
    fn new(delays: Vec<Duration>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            hypothesis_calls: AtomicUsize::new(0),
            delays,
            fail_taxonomy: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_taxonomy: true,
            ..Self::new(Vec::new())
        }
    }
}

fn product_config(product: &str) -> String {
    let labels = |prefix: &str| (0..10).map(|i| format!("{prefix} {i}")).collect::<Vec<_>>();
    json!({
        "productName": product,
        "jobs": labels("Job"),
        "segments": labels("Segment"),
        "contexts": labels("Context"),
        "clusters": [
            { "name": "Slow checkout", "journeyStage": "Purchase", "impactWeight": 9, "templates": ["checkout hangs"] },
            { "name": "Lost parcels", "journeyStage": "Retention", "impactWeight": 5, "templates": ["where is my parcel"] }
        ]
    })
    .to_string()
}

fn text(content: String) -> ChatResponse {
    ChatResponse {
        content,
        input_tokens: 1,
        output_tokens: 1,
        latency: Duration::from_millis(1),
        finish_reason: FinishReason::Stop,
    }
}

#[async_trait::async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(n) {
            tokio::time::sleep(*delay).await;
        }
        match req.attribution.caller {
            "copilot::taxonomy" if self.fail_taxonomy => Err(ProviderError::provider(
                "scripted",
                "backend unavailable",
                false,
            )),
            "copilot::taxonomy" => Ok(text(product_config(&format!("Shop {n}")))),
            "copilot::hypotheses" => {
                self.hypothesis_calls.fetch_add(1, Ordering::SeqCst);
                Ok(text(
                    json!({
                        "quickWins": [{ "text": "We believe that one-click pay helps" }],
                        "balanced": [],
                        "revolutionary": []
                    })
                    .to_string(),
                ))
            }
            _ => {
                let context = req
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(text(format!("echo: {}", context.lines().nth(1).unwrap_or(""))))
            }
        }
    }
}

fn session_with(gateway: Arc<ScriptedGateway>) -> Session {
    let copilot = Copilot::new(gateway, CopilotConfig::default());
    Session::new(
        default_taxonomy(),
        GeneratorConfig::default().with_count(300).with_seed(17),
    )
    .unwrap()
    .with_copilot(Arc::new(copilot))
}

#[tokio::test]
async fn regenerate_publishes_the_new_taxonomy() {
    let session = session_with(Arc::new(ScriptedGateway::new(Vec::new())));
    let before = session.current().unwrap();

    let published = session.regenerate("An online shop", None).await.unwrap();
    assert_ne!(published.id, before.id);
    assert_eq!(published.taxonomy.product_name, "Shop 0");
    assert_eq!(published.clusters.len(), 2);
    assert_eq!(session.current().unwrap().id, published.id);

    let ranking = session.rankings(GroupKey::Cluster).unwrap();
    assert_eq!(ranking.len(), 2);
}

#[tokio::test]
async fn older_request_finishing_last_is_discarded() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Duration::from_millis(300),
        Duration::from_millis(10),
    ]));
    let session = session_with(gateway);

    let (slow, fast) = tokio::join!(
        session.regenerate("first", None),
        session.regenerate("second", None),
    );

    assert!(
        matches!(slow, Err(SessionError::Superseded { ticket: 1, latest: 2 })),
        "{slow:?}"
    );
    let fast = fast.unwrap();
    let current = session.current().unwrap();
    assert_eq!(current.id, fast.id);
    assert_eq!(current.taxonomy.product_name, "Shop 1");
}

#[tokio::test]
async fn cancelled_request_keeps_previous_generation() {
    let session = session_with(Arc::new(ScriptedGateway::new(Vec::new())));
    let before = session.current().unwrap().id;

    let cancel = AtomicBool::new(true);
    let err = session.regenerate("shop", Some(&cancel)).await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(session.current().unwrap().id, before);
}

#[tokio::test]
async fn backend_failure_keeps_previous_generation() {
    let session = session_with(Arc::new(ScriptedGateway::failing()));
    let before = session.current().unwrap();

    let err = session.regenerate("shop", None).await.unwrap_err();
    assert!(matches!(err, SessionError::Copilot(_)), "{err:?}");
    let after = session.current().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.taxonomy.product_name, before.taxonomy.product_name);
}

#[tokio::test]
async fn hypotheses_are_memoized_per_generation() {
    let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
    let session = session_with(Arc::clone(&gateway));
    let cluster = session.current().unwrap().clusters[0].name.clone();

    let first = session.hypotheses(&cluster).await.unwrap();
    let second = session.hypotheses(&cluster).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(gateway.hypothesis_calls.load(Ordering::SeqCst), 1);

    session.regenerate_with_taxonomy(None).unwrap();
    session.hypotheses(&cluster).await.unwrap();
    assert_eq!(gateway.hypothesis_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn chat_sends_cluster_context() {
    let session = session_with(Arc::new(ScriptedGateway::new(Vec::new())));
    let cluster = session.current().unwrap().clusters[0].name.clone();

    let answer = session.chat(&cluster, "Estimate the impact").await.unwrap();
    assert_ne!(answer, CHAT_FALLBACK);
    assert!(answer.starts_with("echo: Product: "), "{answer}");
}
