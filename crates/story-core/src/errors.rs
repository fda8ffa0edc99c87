//! Taxonomía única de errores del core.
//!
//! Un solo enum cruza todos los componentes: el Reliability Layer produce las
//! variantes de proveedor, el runtime las de parse/validación y el
//! orquestador las de estado. Los errores son serializables porque viajan
//! dentro de eventos (`StepFailed`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::ModelTier;
use crate::validate::ValidationIssue;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("project not found: {0}")] NotFound(String),
    #[error("project already exists: {0}")] AlreadyExists(String),
    #[error("an execution is already running for this project")] Busy,
    #[error("invalid step index: {0}")] InvalidStepIndex(usize),
    #[error("unsatisfied dependencies for step {step}: missing {missing:?}")]
    UnsatisfiedDependencies { step: usize, missing: Vec<usize> },
    #[error("step {step} in cooldown until {until}")]
    Cooldown { step: usize, until: DateTime<Utc> },
    #[error("cancelled")] Cancelled,
    #[error("artifact missing for step {step}")] MissingArtifact { step: usize },
    #[error("artifact corrupt for step {step}: {detail}")]
    CorruptArtifact { step: usize, detail: String },
    #[error("parse failed: {0}")] Parse(String),
    #[error("validation failed for step {step} after {attempts} attempts")]
    Validation {
        step: usize,
        attempts: u32,
        issues: Vec<ValidationIssue>,
    },
    #[error("network error: {0}")] Network(String),
    #[error("rate limited: {0}")] RateLimit(String),
    #[error("transient provider error: {0}")] Transient(String),
    #[error("provider rejected the request: {0}")] InvalidInput(String),
    #[error("permanent provider error: {0}")] Permanent(String),
    #[error("circuit open for {provider}/{model}")]
    CircuitOpen { provider: String, model: String },
    #[error("all candidates failed for tier {tier}")]
    AllCandidatesFailed { tier: ModelTier },
    #[error("io error: {0}")] Io(String),
    #[error("unknown error: {0}")] Unknown(String),
    #[error("internal: {0}")] Internal(String),
}

impl EngineError {
    /// ¿El paso que recibió este error puede reintentarse más tarde sin
    /// intervención? (Lo usa el orquestador para decidir cooldown.)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self,
                  EngineError::Permanent(_)
                  | EngineError::InvalidInput(_)
                  | EngineError::AlreadyExists(_)
                  | EngineError::NotFound(_)
                  | EngineError::InvalidStepIndex(_))
    }
}
