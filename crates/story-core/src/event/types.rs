//! Tipos de evento del pipeline.
//!
//! El log por proyecto es append-only: reconstruir la historia de una
//! corrida es leerlo en orden de `seq`. El enum es el contrato observable
//! del motor; los observadores externos consumen el archivo por tailing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::ModelDescriptor;
use crate::validate::ValidationIssue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEventKind {
    /// Alta del proyecto. Primer evento de todo log.
    ProjectCreated { name: String },
    /// Un paso comenzó su ejecución. No implica éxito.
    StepStarted { step_index: usize, step_name: String },
    /// Avance dentro de un paso con fanout.
    StepProgress {
        step_index: usize,
        completed: usize,
        total: usize,
    },
    /// Un paso terminó y su artifact quedó publicado.
    StepCompleted {
        step_index: usize,
        step_name: String,
        content_hash: String,
        upstream_hash: String,
        model: Option<ModelDescriptor>,
        attempts: u32,
        degraded: bool,
    },
    /// Un paso terminó con error terminal (luego de retries y fallback).
    StepFailed {
        step_index: usize,
        step_name: String,
        error: EngineError,
    },
    /// Cancelación observada: no se escribió artifact.
    StepCancelled { step_index: usize },
    /// El validador rechazó el intento `attempt`; alimenta la revisión.
    ValidationFailed {
        step_index: usize,
        attempt: u32,
        issues: Vec<ValidationIssue>,
    },
    /// Revisión explícita solicitada por el caller.
    RevisionStarted {
        step_index: usize,
        snapshot_version: Option<u32>,
        guidance: Option<String>,
    },
    /// El reliability layer avanzó al siguiente candidato de la cadena.
    ProviderFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
    },
    /// Circuito abierto para un (provider, model).
    CircuitOpened {
        provider: String,
        model: String,
        open_until: DateTime<Utc>,
    },
    /// Circuito cerrado tras un probe exitoso.
    CircuitClosed { provider: String, model: String },
    /// Marca de avance persistente tras completar o invalidar pasos.
    Checkpoint {
        completed_steps: Vec<usize>,
        current_step: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Asignado por el store en orden de append, 0-based por proyecto.
    pub seq: u64,
    pub project_id: Uuid,
    pub kind: PipelineEventKind,
    /// Metadato; no participa de ningún hash.
    pub ts: DateTime<Utc>,
}
