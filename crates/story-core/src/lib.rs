//! story-core: orquestador determinista del pipeline de generación.
//!
//! Propósito:
//! - Ejecutar un DAG fijo de pasos de expansión narrativa despachando cada
//!   paso a proveedores LLM, validando el resultado y persistiéndolo como
//!   artifact inmutable antes de que la descendencia pueda consumirlo.
//! - Garantizar reanudabilidad (upstream hashes + checkpoint de eventos) y
//!   resiliencia (cadena de candidatos, circuit breaker, backoff, fallback
//!   de emergencia).
//!
//! Componentes principales:
//! - `engine`: orquestador `PipelineEngine` (readiness, frescura, revisión,
//!   invalidación en cascada).
//! - `runtime`: template method por paso y fanout acotado.
//! - `llm`: reliability layer sobre el trait `LlmProvider`.
//! - `validate`: reportes estructurados que alimentan la revisión.
//! - `event`: log append-only por proyecto.
//! - `store`: trait del blob store por proyecto (backend fs en
//!   `story-persistence`).
//! - `registry` / `step`: tabla del DAG y contrato de cada paso.
//! - `hashing`: JSON canónico + BLAKE3.

pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod llm;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod step;
pub mod store;
pub mod validate;

pub use engine::{PipelineEngine, PipelineEngineBuilder};
pub use errors::EngineError;
pub use event::{EventScope, EventStore, InMemoryEventStore, PipelineEvent, PipelineEventKind};
pub use llm::{Candidate, GenerateOutput, GenerateRequest, LlmClient, LlmClientConfig, LlmProvider, ModelTier,
              ProviderError, ProviderRequest, ProviderResponse, TierChains};
pub use model::{ArtifactEnvelope, ModelDescriptor, Project, ProjectStatus, StatusSnapshot, StepContext};
pub use registry::StepRegistry;
pub use runtime::{lenient_json, RuntimeConfig, StepOutcome, StepRuntime};
pub use step::{ParsedPayload, PromptBundle, StepDefinition, StepDescriptor, StepPlan, SubPrompt};
pub use store::{InMemoryProjectStore, ProjectStore};
pub use validate::{ValidationIssue, ValidationReport};
