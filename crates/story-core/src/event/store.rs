//! Trait de almacenamiento de eventos y backend en memoria.
//!
//! Contrato:
//! - `append_kind` asigna `seq` y `ts`, y es durable al retornar (para el
//!   backend de archivo eso implica fsync).
//! - Los appends de un mismo proyecto están totalmente ordenados; entre
//!   proyectos no hay garantía.
//! - Los callers pueden ser concurrentes dentro del proceso: el store
//!   serializa por proyecto.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{PipelineEvent, PipelineEventKind};
use crate::errors::EngineError;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Agrega un evento al log del proyecto y devuelve el evento persistido
    /// (con `seq` y `ts` asignados).
    async fn append_kind(&self, project_id: Uuid, kind: PipelineEventKind) -> Result<PipelineEvent, EngineError>;

    /// Lista los eventos de un proyecto en orden ascendente por `seq`.
    async fn list(&self, project_id: Uuid) -> Result<Vec<PipelineEvent>, EngineError>;
}

/// Backend volátil para tests y corridas en memoria.
///
/// El entry del DashMap actúa como mutex por proyecto: dos appends sobre el
/// mismo `project_id` se serializan, appends de proyectos distintos no se
/// bloquean entre sí.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<PipelineEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cantidad de eventos registrados para un proyecto.
    pub fn len_for(&self, project_id: Uuid) -> usize {
        self.inner.get(&project_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_kind(&self, project_id: Uuid, kind: PipelineEventKind) -> Result<PipelineEvent, EngineError> {
        let mut log = self.inner.entry(project_id).or_default();
        let ev = PipelineEvent { seq: log.len() as u64,
                                 project_id,
                                 kind,
                                 ts: Utc::now() };
        log.push(ev.clone());
        Ok(ev)
    }

    async fn list(&self, project_id: Uuid) -> Result<Vec<PipelineEvent>, EngineError> {
        Ok(self.inner.get(&project_id).map(|v| v.clone()).unwrap_or_default())
    }
}
