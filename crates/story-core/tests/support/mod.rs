//! Soporte compartido por los tests de integración del engine: un paso de
//! prueba configurable, un proveedor con guion y armado de engine en
//! memoria.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use story_core::{lenient_json, Candidate, EngineError, InMemoryEventStore, InMemoryProjectStore, LlmClient,
                 LlmClientConfig, LlmProvider, ModelTier, ParsedPayload, PipelineEngine, PromptBundle, ProviderError,
                 ProviderRequest, ProviderResponse, RuntimeConfig, StepContext, StepDefinition, StepDescriptor,
                 StepPlan, StepRegistry, SubPrompt, TierChains, ValidationReport};

/// Paso de prueba: valida que el payload tenga `value` (o `subs` ensamblado).
pub struct TestStep {
    pub version: String,
    pub fanout: Option<usize>,
    pub fallback_payload: Option<Value>,
    pub sub_fallback: bool,
}

impl Default for TestStep {
    fn default() -> Self {
        Self { version: "test-pv".to_string(),
               fanout: None,
               fallback_payload: None,
               sub_fallback: false }
    }
}

impl StepDefinition for TestStep {
    fn prompt_version(&self) -> &str {
        &self.version
    }

    fn plan(&self, _ctx: &StepContext) -> Result<StepPlan, EngineError> {
        match self.fanout {
            Some(n) => Ok(StepPlan::Fanout { subtasks: (0..n).map(|i| SubPrompt { label: format!("sub {i}"),
                                                                                  prompt: PromptBundle { system:
                                                                                              "test system".into(),
                                                                                          user: format!("subtask {i}") } })
                                                             .collect() }),
            None => Ok(StepPlan::Single { prompt: PromptBundle { system: "test system".into(),
                                                                 user: "produce a value".into() } }),
        }
    }

    fn parse(&self, raw: &str) -> ParsedPayload {
        lenient_json(raw)
    }

    fn parse_sub(&self, sub: usize, raw: &str) -> ParsedPayload {
        ParsedPayload::clean(json!({"sub": sub, "text": raw.trim()}))
    }

    fn validate(&self, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let has_value = payload.get("value")
                               .and_then(Value::as_str)
                               .map(|s| !s.is_empty())
                               .unwrap_or(false);
        let assembled = payload.get("subs").map(Value::is_array).unwrap_or(false);
        if !has_value && !assembled {
            report.push("missing_field", "payload has no value", "respond with {\"value\": \"...\"}");
        }
        report
    }

    fn validate_sub(&self, _sub: usize, payload: &Value, _ctx: &StepContext) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let rejected = payload.get("text")
                              .and_then(Value::as_str)
                              .map(|s| s.contains("fail"))
                              .unwrap_or(false);
        if rejected {
            report.push("missing_field", "subtask text rejected", "do not answer with fail");
        }
        report
    }

    fn assemble(&self, _ctx: &StepContext, subs: Vec<Value>) -> Result<Value, EngineError> {
        Ok(json!({"value": "assembled", "subs": subs}))
    }

    fn fallback(&self, _ctx: &StepContext) -> Option<Value> {
        self.fallback_payload.clone()
    }

    fn fallback_sub(&self, _ctx: &StepContext, sub: usize) -> Option<Value> {
        if self.sub_fallback {
            Some(json!({"sub": sub, "text": "stub"}))
        } else {
            None
        }
    }
}

/// Proveedor con guion para los tests (respuestas/fallas en orden).
pub struct TestProvider {
    id: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl TestProvider {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(),
               script: Mutex::new(VecDeque::new()),
               calls: AtomicUsize::new(0) }
    }

    pub fn ok(&self, text: &str) {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn ok_times(&self, text: &str, n: usize) {
        for _ in 0..n {
            self.ok(text);
        }
    }

    pub fn err(&self, err: ProviderError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn err_times(&self, err: ProviderError, n: usize) {
        for _ in 0..n {
            self.err(err.clone());
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for TestProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, _model: &str, _req: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(ProviderResponse { text,
                                                    tokens_in: 0,
                                                    tokens_out: 1 }),
            Some(Err(err)) => Err(err),
            None => Err(ProviderError::status(500, "script exhausted")),
        }
    }
}

/// Descriptor de prueba con defaults razonables.
pub fn descriptor(index: usize,
                  parents: &'static [usize],
                  definition: Arc<dyn StepDefinition>,
                  allow_fallback: bool,
                  fanout: bool)
                  -> StepDescriptor {
    StepDescriptor { index,
                     name: "test_step",
                     parents,
                     tier: ModelTier::Fast,
                     max_tokens: 128,
                     temperature: 0.0,
                     fanout,
                     allow_fallback,
                     definition }
}

/// Registro lineal 0 → 1 → 2 con pasos de prueba simples.
pub fn linear_registry() -> StepRegistry {
    StepRegistry::new(vec![descriptor(0, &[], Arc::new(TestStep::default()), false, false),
                           descriptor(1, &[0], Arc::new(TestStep::default()), false, false),
                           descriptor(2, &[0, 1], Arc::new(TestStep::default()), false, false)]).unwrap()
}

pub struct Harness {
    pub engine: Arc<PipelineEngine>,
    pub store: Arc<InMemoryProjectStore>,
    pub events: Arc<InMemoryEventStore>,
}

/// Arma un engine en memoria con una cadena de candidatos dada.
pub fn harness(providers: Vec<Arc<dyn LlmProvider>>, chain: Vec<Candidate>, registry: StepRegistry) -> Harness {
    let store = Arc::new(InMemoryProjectStore::new());
    let events = Arc::new(InMemoryEventStore::new());
    let llm = Arc::new(LlmClient::new(providers, LlmClientConfig::new(TierChains::uniform(chain))));
    let engine = PipelineEngine::builder().store(store.clone())
                                          .events(events.clone())
                                          .registry(Arc::new(registry))
                                          .llm(llm)
                                          .runtime_config(RuntimeConfig::default())
                                          .build()
                                          .unwrap();
    Harness { engine: Arc::new(engine),
              store,
              events }
}

/// Cadena de un solo candidato sobre el proveedor dado.
pub fn single_chain(provider_id: &str) -> Vec<Candidate> {
    vec![Candidate::new(provider_id, format!("{provider_id}-model"))]
}

/// Eventos de un proyecto, ya listados.
pub async fn events_of(harness: &Harness, project: Uuid) -> Vec<story_core::PipelineEvent> {
    use story_core::EventStore;
    harness.events.list(project).await.unwrap()
}
