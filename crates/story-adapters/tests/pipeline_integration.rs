//! Integración del pipeline snowflake completo contra proveedores con guion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use story_adapters::providers::{FlakyProvider, ScriptedProvider};
use story_adapters::snowflake_registry;
use story_core::{ArtifactEnvelope, Candidate, EngineError, InMemoryEventStore, InMemoryProjectStore, LlmClient,
                 LlmClientConfig, LlmProvider, PipelineEngine, PipelineEventKind, ProjectStatus, ProjectStore,
                 ProviderError, ProviderRequest, ProviderResponse, TierChains};
use story_domain::{Manuscript, SceneBriefList};

struct Harness {
    engine: Arc<PipelineEngine>,
    store: Arc<InMemoryProjectStore>,
    events: Arc<InMemoryEventStore>,
}

fn harness_with(provider: Arc<dyn LlmProvider>) -> Harness {
    let store = Arc::new(InMemoryProjectStore::new());
    let events = Arc::new(InMemoryEventStore::new());
    let chains = TierChains::uniform(vec![Candidate::new(provider.id(), "test-model")]);
    let llm = Arc::new(LlmClient::new(vec![provider], LlmClientConfig::new(chains)));
    let engine = PipelineEngine::builder().store(store.clone())
                                          .events(events.clone())
                                          .registry(Arc::new(snowflake_registry().unwrap()))
                                          .llm(llm)
                                          .build()
                                          .unwrap();
    Harness { engine: Arc::new(engine),
              store,
              events }
}

fn filler(words: usize) -> String {
    vec!["palabra"; words].join(" ")
}

const LEAD: &str = "Mireille Fabre";
const RIVAL: &str = "The Ghost of the Varietes";

fn category_json() -> String {
    json!({"category": "Historical Mystery", "story_kind": "paranormal detective tale",
           "audience_delight": ["ghost reveals", "period atmosphere", "fair-play clues"]}).to_string()
}

fn logline_json(words: usize) -> String {
    json!({"logline": filler(words), "word_count": 0,
           "components": {"lead": "a sceptical detective", "role": "police detective",
                          "goal": "unmask the ghost", "opposition": "the ghost"}}).to_string()
}

fn paragraph_json() -> String {
    let sentences = vec!["A detective is sent to debunk a theatre ghost.".to_string(),
                        "A public haunting forces her into ridicule.".to_string(),
                        "She must confront what the ghost knows about her past.".to_string(),
                        "A final seance forces a choice between career and truth.".to_string(),
                        "She unmasks the living hand behind the ghost.".to_string()];
    let disasters = vec![sentences[1].clone(), sentences[2].clone(), sentences[3].clone()];
    json!({"paragraph": sentences.join(" "), "sentences": sentences,
           "moral_premise": "People win when they protect the truth over their reputation.",
           "disasters": disasters}).to_string()
}

fn character(name: &str, conflict: &str) -> Value {
    json!({"name": name, "role": "principal", "goal": "a goal", "ambition": "an ambition",
           "values": ["truth"], "conflict": conflict, "epiphany": "an epiphany", "arc": "an arc"})
}

fn characters_json(conflict: &str) -> String {
    json!({"characters": [character(LEAD, conflict), character(RIVAL, conflict)]}).to_string()
}

fn page_json() -> String {
    json!({"paragraphs": {"1": filler(60), "2": filler(60), "3": filler(60), "4": filler(60),
                          "5": filler(60)}}).to_string()
}

fn synopses_json() -> String {
    json!({"character_synopses": [{"name": LEAD, "synopsis": filler(310)},
                                  {"name": RIVAL, "synopsis": filler(310)}]}).to_string()
}

fn long_synopsis_json() -> String {
    json!({"long_synopsis": filler(2_600)}).to_string()
}

fn bibles_json() -> String {
    let bible = |name: &str| {
        json!({"name": name, "physical": "tall", "voice": "dry", "background": "long",
               "personality": "sharp", "relationships": "complicated", "quirks": ["hums"],
               "vulnerabilities": ["pride"]})
    };
    json!({"bibles": [bible(LEAD), bible(RIVAL)]}).to_string()
}

fn scene_list_payload(count: usize) -> Value {
    let target = (90_000 / count) as u32;
    let scenes: Vec<Value> = (1..=count).map(|i| {
                                            json!({"index": i, "type": "proactive", "pov": LEAD,
                                                   "summary": format!("scene {i}"), "location": "Paris",
                                                   "time": "night", "word_target": target,
                                                   "conflict": "a conflict", "disaster_anchor": null,
                                                   "hooks": "a hook"})
                                        })
                                        .collect();
    json!({ "scenes": scenes })
}

fn brief_json() -> String {
    json!({"kind": "proactive", "goal": "a goal", "conflict": "a conflict", "setback": "a setback",
           "stakes": "the stakes"}).to_string()
}

fn prose_json(words: usize) -> String {
    json!({"prose": filler(words)}).to_string()
}

/// Escenario feliz de punta a punta: semilla → manuscrito.
#[tokio::test]
async fn full_pipeline_reaches_the_manuscript() {
    let scenes = 40usize;
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_ok(category_json());
    provider.push_ok(logline_json(20));
    provider.push_ok(paragraph_json());
    provider.push_ok(characters_json("a conflict"));
    provider.push_ok(page_json());
    provider.push_ok(synopses_json());
    provider.push_ok(long_synopsis_json());
    provider.push_ok(bibles_json());
    provider.push_ok(scene_list_payload(scenes).to_string());
    for _ in 0..scenes {
        provider.push_ok(brief_json());
    }
    for _ in 0..scenes {
        provider.push_ok(prose_json(120));
    }

    let h = harness_with(provider.clone());
    let project = h.engine
                   .create_project("demo", "A detective hunts a ghost in 1920s Paris")
                   .await
                   .unwrap();
    let done = h.engine.execute_all(project.id, 10).await.unwrap();

    assert_eq!(done.completed_steps.len(), 11);
    assert_eq!(done.status, ProjectStatus::Completed);
    assert_eq!(provider.calls(), 9 + scenes * 2);

    for step in 0..=10usize {
        let artifact = h.store.read_artifact(project.id, step).await.unwrap();
        assert!(!artifact.degraded, "step {step} must not be degraded");
    }

    let briefs: SceneBriefList =
        serde_json::from_value(h.store.read_artifact(project.id, 9).await.unwrap().payload).unwrap();
    assert_eq!(briefs.briefs.len(), scenes);
    assert!(briefs.briefs.iter().enumerate().all(|(i, b)| b.scene_index == i + 1));

    let manuscript: Manuscript =
        serde_json::from_value(h.store.read_artifact(project.id, 10).await.unwrap().payload).unwrap();
    assert_eq!(manuscript.scene_count(), scenes);
    assert_eq!(manuscript.chapters.len(), scenes / 4);
    assert_eq!(manuscript.total_word_count, scenes * 120);
}

/// Escenario: logline larga → revisión → éxito al segundo intento.
#[tokio::test]
async fn overlong_logline_is_revised_and_accepted() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_ok(category_json());
    provider.push_ok(logline_json(31));
    provider.push_ok(logline_json(23));

    let h = harness_with(provider.clone());
    let project = h.engine.create_project("demo", "seed").await.unwrap();
    h.engine.execute_all(project.id, 1).await.unwrap();

    let artifact = h.store.read_artifact(project.id, 1).await.unwrap();
    assert_eq!(artifact.attempts, 2);
    assert!(!artifact.degraded);

    use story_core::EventStore;
    let events = h.events.list(project.id).await.unwrap();
    assert!(events.iter().any(|e| matches!(&e.kind,
        PipelineEventKind::ValidationFailed { step_index: 1, attempt: 1, issues }
            if issues.iter().any(|i| i.code == "word_count"))));
}

/// Escenario: el paso 3 agota sus intentos y cae al elenco sintetizado.
#[tokio::test]
async fn unparsable_characters_fall_back_to_the_synthesised_cast() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_ok(category_json());
    provider.push_ok(logline_json(18));
    provider.push_ok(paragraph_json());
    for _ in 0..3 {
        provider.push_ok("I would rather not answer with structure today.");
    }
    provider.push_ok(page_json());

    let h = harness_with(provider.clone());
    let project = h.engine.create_project("demo", "seed").await.unwrap();
    h.engine.execute_all(project.id, 3).await.unwrap();

    let artifact = h.store.read_artifact(project.id, 3).await.unwrap();
    assert!(artifact.degraded);
    assert_eq!(artifact.model, None);
    assert_eq!(artifact.payload["characters"][0]["name"], "The Lead");
    assert_eq!(artifact.payload["characters"][1]["name"], "The Opposition");

    // el pipeline sigue: el paso 4 no depende del 3 y corre normalmente
    let four = h.engine.execute_step(project.id, 4).await.unwrap();
    assert!(!four.degraded);
}

/// Escenario: revisión del paso 3 con cascada sobre los posteriores.
#[tokio::test]
async fn revising_step_three_snapshots_and_cascades() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_ok(category_json());
    provider.push_ok(logline_json(18));
    provider.push_ok(paragraph_json());
    provider.push_ok(characters_json("the original conflict"));
    provider.push_ok(page_json());
    provider.push_ok(synopses_json());

    let h = harness_with(provider.clone());
    let project = h.engine.create_project("demo", "seed").await.unwrap();
    h.engine.execute_all(project.id, 5).await.unwrap();

    provider.push_ok(characters_json("a sharper conflict"));
    h.engine
     .revise_step(project.id, 3, Some("sharpen the antagonism".into()))
     .await
     .unwrap();

    assert_eq!(h.store.snapshot_versions(project.id, 3).await.unwrap(), vec![1]);
    let status = h.engine.status(project.id).await.unwrap();
    assert_eq!(status.completed_steps.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    // el paso 5 quedó stale respecto del nuevo paso 3 y se regenera
    provider.push_ok(synopses_json());
    let five = h.engine.execute_step(project.id, 5).await.unwrap();
    assert!(!five.degraded);
    assert_eq!(h.store.snapshot_versions(project.id, 5).await.unwrap(), vec![1]);

    // el paso 4 no desciende del 3: su artifact sigue fresco y se re-adopta
    let calls_before = provider.calls();
    h.engine.execute_step(project.id, 4).await.unwrap();
    assert_eq!(provider.calls(), calls_before, "step 4 is fresh and re-adopted without regeneration");
}

/// Un proveedor inestable se recupera dentro del presupuesto de retries.
#[tokio::test(start_paused = true)]
async fn a_flaky_provider_recovers_within_the_retry_budget() {
    let inner = Arc::new(ScriptedProvider::new("inner"));
    inner.push_ok(category_json());
    let flaky = Arc::new(FlakyProvider::new("flaky",
                                            inner,
                                            3,
                                            ProviderError::status(503, "warming up")));
    let h = harness_with(flaky);
    let project = h.engine.create_project("demo", "seed").await.unwrap();

    let artifact = h.engine.execute_step(project.id, 0).await.unwrap();
    assert!(!artifact.degraded);
    assert_eq!(artifact.attempts, 1, "retries happen below the generation attempt counter");
}

/// Un 429 con `retry_after` se respeta y la corrida completa igual.
#[tokio::test(start_paused = true)]
async fn rate_limited_category_retries_after_the_hint() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_err(ProviderError::status(429, "slow down").with_retry_after(Duration::from_secs(3)));
    provider.push_ok(category_json());
    let h = harness_with(provider.clone());
    let project = h.engine.create_project("demo", "seed").await.unwrap();

    let started = tokio::time::Instant::now();
    h.engine.execute_step(project.id, 0).await.unwrap();
    assert_eq!(provider.calls(), 2);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

/// Proveedor de briefs que dispara la cancelación en la llamada N.
struct CancellingBriefProvider {
    id: String,
    after: usize,
    calls: AtomicUsize,
    target: Mutex<Option<(Arc<PipelineEngine>, Uuid)>>,
}

#[async_trait]
impl LlmProvider for CancellingBriefProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, _model: &str, _req: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.after {
            if let Some((engine, id)) = self.target.lock().unwrap().clone() {
                engine.cancel(id);
            }
        }
        Ok(ProviderResponse { text: brief_json(),
                              tokens_in: 0,
                              tokens_out: 1 })
    }
}

/// Escenario: cancelación en pleno fanout del paso 9.
#[tokio::test]
async fn cancellation_mid_briefs_leaves_no_artifact() {
    let scenes = 60usize;
    let provider = Arc::new(CancellingBriefProvider { id: "cancelling".into(),
                                                      after: 20,
                                                      calls: AtomicUsize::new(0),
                                                      target: Mutex::new(None) });
    let h = harness_with(provider.clone());
    let project = h.engine.create_project("demo", "seed").await.unwrap();
    provider.target.lock().unwrap().replace((h.engine.clone(), project.id));

    // sembrar la lista de escenas como si el paso 8 ya hubiera corrido
    let scene_list = ArtifactEnvelope::new(8, "scene_list", "up".into(), scene_list_payload(scenes), None, 1, false);
    h.store.write_artifact(project.id, &scene_list, None).await.unwrap();

    let err = h.engine.execute_step(project.id, 9).await.unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
    assert!(provider.calls.load(Ordering::SeqCst) < scenes,
            "no further subtask started after the cancellation");
    assert!(matches!(h.store.read_artifact(project.id, 9).await,
                     Err(EngineError::MissingArtifact { .. })));
    let status = h.engine.status(project.id).await.unwrap();
    assert!(!status.completed_steps.contains(&9));

    use story_core::EventStore;
    let events = h.events.list(project.id).await.unwrap();
    assert!(events.iter().any(|e| matches!(e.kind, PipelineEventKind::StepCancelled { step_index: 9 })));
}
