//! Registro de proyecto y snapshot de estado.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Estado de un proyecto. Sólo el orquestador lo muta; el store lo persiste.
///
/// Invariantes:
/// - `completed_steps` es cerrado hacia abajo respecto del DAG.
/// - `current_step` no decrece salvo por revisión explícita.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub seed: String,
    pub current_step: usize,
    pub completed_steps: BTreeSet<usize>,
    pub status: ProjectStatus,
}

impl Project {
    pub fn new(name: impl Into<String>, seed: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               created_at: Utc::now(),
               seed: seed.into(),
               current_step: 0,
               completed_steps: BTreeSet::new(),
               status: ProjectStatus::Created }
    }

    pub fn is_completed(&self, step: usize) -> bool {
        self.completed_steps.contains(&step)
    }
}

/// Snapshot latest-wins que se publica en `status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: Uuid,
    pub name: String,
    pub current_step: usize,
    pub completed_steps: Vec<usize>,
    pub status: ProjectStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for StatusSnapshot {
    fn from(p: &Project) -> Self {
        Self { id: p.id,
               name: p.name.clone(),
               current_step: p.current_step,
               completed_steps: p.completed_steps.iter().copied().collect(),
               status: p.status,
               updated_at: Utc::now() }
    }
}
