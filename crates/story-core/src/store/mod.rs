//! Store de proyectos: trait neutral + backend en memoria.
//!
//! Contrato:
//! - `write_artifact` publica de forma atómica; si ya existía un artifact
//!   para ese paso, primero lo preserva como snapshot numerado. Nunca se
//!   borra historia.
//! - `read_artifact` distingue `MissingArtifact` (no existe) de
//!   `CorruptArtifact` (existe pero no decodifica); un corrupto jamás se
//!   elimina automáticamente.
//! - `write_status` reemplaza el registro del proyecto y su snapshot de
//!   estado (latest-wins).

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::{ArtifactEnvelope, Project};

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Alta del proyecto (metadata + semilla). `AlreadyExists` si ya estaba.
    async fn create(&self, project: &Project) -> Result<(), EngineError>;

    /// Reconstruye el proyecto persistido. `NotFound` si no existe.
    async fn load(&self, project_id: Uuid) -> Result<Project, EngineError>;

    /// Reemplaza el registro del proyecto y el snapshot de estado.
    async fn write_status(&self, project: &Project) -> Result<(), EngineError>;

    async fn read_artifact(&self, project_id: Uuid, step: usize) -> Result<ArtifactEnvelope, EngineError>;

    /// Publica el artifact (y su rendering opcional), snapshoteando la
    /// versión previa si la había.
    async fn write_artifact(&self,
                            project_id: Uuid,
                            artifact: &ArtifactEnvelope,
                            human: Option<&str>)
                            -> Result<(), EngineError>;

    /// Versiones de snapshot existentes para un paso, ascendentes.
    async fn snapshot_versions(&self, project_id: Uuid, step: usize) -> Result<Vec<u32>, EngineError>;
}

/// Backend volátil para tests y corridas efímeras.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: DashMap<Uuid, Project>,
    artifacts: DashMap<(Uuid, usize), ArtifactEnvelope>,
    snapshots: DashMap<(Uuid, usize), Vec<ArtifactEnvelope>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn create(&self, project: &Project) -> Result<(), EngineError> {
        if self.projects.contains_key(&project.id) {
            return Err(EngineError::AlreadyExists(project.id.to_string()));
        }
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn load(&self, project_id: Uuid) -> Result<Project, EngineError> {
        self.projects
            .get(&project_id)
            .map(|p| p.clone())
            .ok_or_else(|| EngineError::NotFound(project_id.to_string()))
    }

    async fn write_status(&self, project: &Project) -> Result<(), EngineError> {
        if !self.projects.contains_key(&project.id) {
            return Err(EngineError::NotFound(project.id.to_string()));
        }
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn read_artifact(&self, project_id: Uuid, step: usize) -> Result<ArtifactEnvelope, EngineError> {
        self.artifacts
            .get(&(project_id, step))
            .map(|a| a.clone())
            .ok_or(EngineError::MissingArtifact { step })
    }

    async fn write_artifact(&self,
                            project_id: Uuid,
                            artifact: &ArtifactEnvelope,
                            _human: Option<&str>)
                            -> Result<(), EngineError> {
        let key = (project_id, artifact.step_index);
        if let Some(previous) = self.artifacts.get(&key).map(|a| a.clone()) {
            self.snapshots.entry(key).or_default().push(previous);
        }
        self.artifacts.insert(key, artifact.clone());
        Ok(())
    }

    async fn snapshot_versions(&self, project_id: Uuid, step: usize) -> Result<Vec<u32>, EngineError> {
        let count = self.snapshots
                        .get(&(project_id, step))
                        .map(|v| v.len())
                        .unwrap_or(0);
        Ok((1..=count as u32).collect())
    }
}
