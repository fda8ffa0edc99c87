//! Bus de eventos del pipeline: tipos, trait de store y scope de emisión.

mod store;
mod types;

use std::sync::Arc;
use uuid::Uuid;

use crate::errors::EngineError;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{PipelineEvent, PipelineEventKind};

/// Par (sink, proyecto) con el que runtime y reliability layer emiten sin
/// conocer el resto del orquestador.
#[derive(Clone)]
pub struct EventScope {
    sink: Arc<dyn EventStore>,
    project_id: Uuid,
}

impl EventScope {
    pub fn new(sink: Arc<dyn EventStore>, project_id: Uuid) -> Self {
        Self { sink, project_id }
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Registra el evento en el log del proyecto. Durable al retornar.
    pub async fn emit(&self, kind: PipelineEventKind) -> Result<PipelineEvent, EngineError> {
        tracing::debug!(project = %self.project_id, event = ?kind, "pipeline event");
        self.sink.append_kind(self.project_id, kind).await
    }
}
