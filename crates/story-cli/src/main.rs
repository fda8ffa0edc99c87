//! storyflow: demo mínima del pipeline contra un proveedor con guion.
//!
//! Corre los pasos 0..3 (categoría → personajes) sobre el store de
//! filesystem (`STORYFLOW_DATA_DIR`, default `./data`) y muestra el avance.
//! Para uso real, registrar un `LlmProvider` que hable con un SDK.

use std::sync::Arc;

use story_adapters::providers::ScriptedProvider;
use story_adapters::snowflake_registry;
use story_core::{Candidate, EngineError, LlmClient, LlmClientConfig, PipelineEngine, TierChains};
use story_persistence::{FsEventStore, FsProjectStore, StoreConfig};

const CATEGORY: &str = r#"{"category": "Historical Mystery", "story_kind": "paranormal detective tale",
  "audience_delight": ["a fair-play ghost mystery", "1920s Paris atmosphere", "a detective who doubts herself"]}"#;

const LOGLINE: &str = r#"{"logline": "A sceptical detective must unmask the ghost terrorising 1920s Paris before the city closes its last honest newspaper.", "word_count": 0,
  "components": {"lead": "a sceptical detective", "role": "police detective", "goal": "unmask the ghost",
                 "opposition": "the ghost and the city's credulity"}}"#;

const PARAGRAPH: &str = r#"{"paragraph": "In 1920s Paris, detective Mireille Fabre is assigned to debunk a theatre ghost. A public haunting forces her onto the front pages and into ridicule. Digging deeper, she must confront evidence that the ghost knows her own buried past. The final seance forces a choice between her career and the truth. She exposes the living hand behind the ghost and accepts what it costs her.",
  "sentences": ["In 1920s Paris, detective Mireille Fabre is assigned to debunk a theatre ghost.",
                "A public haunting forces her onto the front pages and into ridicule.",
                "Digging deeper, she must confront evidence that the ghost knows her own buried past.",
                "The final seance forces a choice between her career and the truth.",
                "She exposes the living hand behind the ghost and accepts what it costs her."],
  "moral_premise": "People win when they stop protecting their reputation and start protecting the truth.",
  "disasters": ["A public haunting forces her onto the front pages and into ridicule.",
                "Digging deeper, she must confront evidence that the ghost knows her own buried past.",
                "The final seance forces a choice between her career and the truth."]}"#;

const CHARACTERS: &str = r#"{"characters": [
  {"name": "Mireille Fabre", "role": "police detective", "goal": "unmask the theatre ghost",
   "ambition": "be taken seriously in a force that laughs at her", "values": ["truth", "method"],
   "conflict": "every clue she publishes feeds the legend she is trying to kill",
   "epiphany": "her reputation was the ghost's best disguise", "arc": "from guarded sceptic to public truth-teller"},
  {"name": "The Ghost of the Varietes", "role": "antagonist", "goal": "keep the haunting profitable",
   "ambition": "own the theatre outright", "values": ["spectacle"],
   "conflict": "the detective's method erodes the legend night by night",
   "epiphany": "none; the mask only comes off when pulled", "arc": "from untouchable legend to unmasked fraud"}
]}"#;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();
    if let Err(err) = run().await {
        println!("❌ pipeline error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), EngineError> {
    println!("🚀 StoryFlow");
    println!("============");

    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.push_ok(CATEGORY);
    provider.push_ok(LOGLINE);
    provider.push_ok(PARAGRAPH);
    provider.push_ok(CHARACTERS);

    let config = StoreConfig::from_env();
    let chains = TierChains::uniform(vec![Candidate::new("scripted", "scripted-demo")]);
    let engine = PipelineEngine::builder().store(Arc::new(FsProjectStore::new(config.clone())))
                                          .events(Arc::new(FsEventStore::new(config)))
                                          .registry(Arc::new(snowflake_registry()?))
                                          .llm(Arc::new(LlmClient::new(vec![provider],
                                                                       LlmClientConfig::new(chains))))
                                          .build()?;

    let project = engine.create_project("demo", "A detective hunts a ghost in 1920s Paris").await?;
    println!("📁 project {}", project.id);

    let done = engine.execute_all(project.id, 3).await?;
    println!("✅ completed steps: {:?}", done.completed_steps.iter().collect::<Vec<_>>());
    println!("   status: {:?}", done.status);
    Ok(())
}
