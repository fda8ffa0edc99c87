//! Integración del reliability layer: cadena de candidatos, retries,
//! clasificación y circuit breaker. Tiempo virtual de tokio para no dormir.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use support::{harness, linear_registry, single_chain, TestProvider};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use async_trait::async_trait;
use story_core::llm::CircuitState;
use story_core::{Candidate, EngineError, EventScope, EventStore, GenerateRequest, InMemoryEventStore, LlmClient,
                 LlmClientConfig, LlmProvider, ModelTier, PipelineEventKind, ProviderError, ProviderRequest,
                 ProviderResponse, TierChains};

fn request() -> GenerateRequest {
    GenerateRequest { system: "s".into(),
                      user: "u".into(),
                      tier: ModelTier::Fast,
                      max_tokens: 16,
                      temperature: 0.0,
                      seed: None }
}

fn client_for(providers: Vec<Arc<dyn LlmProvider>>, chain: Vec<Candidate>) -> LlmClient {
    LlmClient::new(providers, LlmClientConfig::new(TierChains::uniform(chain)))
}

#[tokio::test(start_paused = true)]
async fn transient_errors_exhaust_retries_then_fall_back_to_next_candidate() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err_times(ProviderError::status(503, "unavailable"), 10);
    let p2 = Arc::new(TestProvider::new("p2"));
    p2.ok(r#"{"value": "from p2"}"#);
    let chain = vec![Candidate::new("p1", "p1-model"), Candidate::new("p2", "p2-model")];
    let h = harness(vec![p1.clone(), p2.clone()], chain, linear_registry());

    let project = h.engine.create_project("demo", "seed").await.unwrap();
    let artifact = h.engine.execute_step(project.id, 0).await.unwrap();

    assert_eq!(artifact.payload["value"], "from p2");
    assert_eq!(p1.calls(), 4, "initial attempt plus three transient retries");
    assert_eq!(p2.calls(), 1);
    let model = artifact.model.unwrap();
    assert_eq!(model.provider, "p2");

    let events = support::events_of(&h, project.id).await;
    assert!(events.iter().any(|e| matches!(&e.kind,
        PipelineEventKind::ProviderFallback { from_provider, to_provider, .. }
            if from_provider == "p1" && to_provider == "p2")));
}

#[tokio::test(start_paused = true)]
async fn circuit_opens_after_threshold_and_rejects_without_io() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err_times(ProviderError::status(503, "down"), 20);
    let client = client_for(vec![p1.clone()], single_chain("p1"));
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events.clone(), Uuid::new_v4());
    let cancel = CancellationToken::new();

    // primera corrida: 4 llamadas (1 + 3 retries), el contador queda en 4
    let err = client.generate(&request(), &scope, &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::AllCandidatesFailed { .. }));
    assert_eq!(p1.calls(), 4);
    assert_eq!(client.circuits().state("p1", "p1-model"), CircuitState::Closed);

    // segunda corrida: la quinta falla consecutiva abre el circuito
    let err = client.generate(&request(), &scope, &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::AllCandidatesFailed { .. }));
    assert_eq!(p1.calls(), 8);
    assert_eq!(client.circuits().state("p1", "p1-model"), CircuitState::Open);

    // tercera corrida: rechazo sin tocar la red
    let err = client.generate(&request(), &scope, &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::AllCandidatesFailed { .. }));
    assert_eq!(p1.calls(), 8, "open circuit short-circuits before any provider call");

    let opened = events.list(scope.project_id())
                       .await
                       .unwrap()
                       .iter()
                       .filter(|e| matches!(e.kind, PipelineEventKind::CircuitOpened { .. }))
                       .count();
    assert_eq!(opened, 1, "the transition is emitted once");
}

#[tokio::test(start_paused = true)]
async fn invalid_input_advances_the_chain_without_retry() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err(ProviderError::status(400, "bad request"));
    let p2 = Arc::new(TestProvider::new("p2"));
    p2.ok("whatever");
    let chain = vec![Candidate::new("p1", "p1-model"), Candidate::new("p2", "p2-model")];
    let client = client_for(vec![p1.clone(), p2.clone()], chain);
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events, Uuid::new_v4());

    let out = client.generate(&request(), &scope, &CancellationToken::new()).await.unwrap();
    assert_eq!(out.provider, "p2");
    assert_eq!(p1.calls(), 1, "invalid_input is not retried");
}

#[tokio::test(start_paused = true)]
async fn permanent_auth_errors_surface_as_permanent() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err(ProviderError::status(401, "bad key"));
    let client = client_for(vec![p1.clone()], single_chain("p1"));
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events, Uuid::new_v4());

    let err = client.generate(&request(), &scope, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::Permanent(_)));
    assert_eq!(p1.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_for_retry_after() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err(ProviderError::status(429, "slow down").with_retry_after(Duration::from_secs(7)));
    p1.ok(r#"{"value": "after the wait"}"#);
    let client = client_for(vec![p1.clone()], single_chain("p1"));
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events, Uuid::new_v4());

    let started = tokio::time::Instant::now();
    let out = client.generate(&request(), &scope, &CancellationToken::new()).await.unwrap();
    assert_eq!(p1.calls(), 2);
    assert!(started.elapsed() >= Duration::from_secs(7), "retry_after is honoured");
    assert!(out.text.contains("after the wait"));
}

/// Proveedor que nunca responde: fuerza el timeout del client.
struct PendingProvider {
    id: String,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for PendingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, _model: &str, _req: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<ProviderResponse, ProviderError>>().await
    }
}

#[tokio::test(start_paused = true)]
async fn timeouts_classify_as_network_and_retry_five_times() {
    let p1 = Arc::new(PendingProvider { id: "p1".into(),
                                        calls: AtomicUsize::new(0) });
    let client = client_for(vec![p1.clone()], single_chain("p1"));
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events, Uuid::new_v4());

    let err = client.generate(&request(), &scope, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::AllCandidatesFailed { .. }));
    assert_eq!(p1.calls.load(Ordering::SeqCst), 6, "initial attempt plus five network retries");
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let p1 = Arc::new(TestProvider::new("p1"));
    p1.err_times(ProviderError::status(503, "down"), 5);
    let client = Arc::new(client_for(vec![p1.clone()], single_chain("p1")));
    let events = Arc::new(InMemoryEventStore::new());
    let scope = EventScope::new(events, Uuid::new_v4());
    let cancel = CancellationToken::new();

    let task = {
        let client = client.clone();
        let scope = scope.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.generate(&request(), &scope, &cancel).await })
    };
    // dejar que entre al primer backoff y cancelar
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let result = task.await.unwrap();
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(p1.calls(), 1, "no further attempts after cancellation");
}
