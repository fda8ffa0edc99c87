//! `FsProjectStore`: blob store por proyecto sobre el filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use story_core::model::{ArtifactEnvelope, Project, ProjectStatus, StatusSnapshot};
use story_core::{EngineError, ProjectStore};

use crate::error::PersistenceError;
use crate::StoreConfig;

/// Shape de `project.json` (la semilla vive en `initial_brief.json`).
#[derive(Debug, Serialize, Deserialize)]
struct ProjectMetaFile {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    current_step: usize,
    completed_steps: Vec<usize>,
    status: ProjectStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct BriefFile {
    brief: String,
}

pub struct FsProjectStore {
    root: PathBuf,
}

impl FsProjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { root: config.root }
    }

    fn project_dir(&self, project_id: Uuid) -> PathBuf {
        self.root.join(project_id.to_string())
    }

    /// Escritura atómica: temp en el mismo directorio, fsync, rename, fsync
    /// del directorio.
    async fn atomic_write(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
        let temp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        {
            let mut file = tokio::fs::File::create(&temp).await?;
            tokio::io::AsyncWriteExt::write_all(&mut file, bytes).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp, target).await?;
        let dir_handle = tokio::fs::File::open(dir).await?;
        dir_handle.sync_all().await?;
        Ok(())
    }

    async fn write_json<T: Serialize>(dir: &Path, target: &Path, value: &T) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        Self::atomic_write(dir, target, &bytes).await
    }

    /// Lectura con un reintento ante error transitorio de IO.
    async fn read_bytes(path: &Path) -> Result<Vec<u8>, std::io::Error> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(err),
            Err(first) => {
                tracing::warn!(path = %path.display(), error = %first, "read failed, retrying once");
                tokio::fs::read(path).await
            }
        }
    }

    /// Ubica el archivo de artifact de un paso (el nombre lleva el nombre
    /// lógico del paso, que el lector no conoce de antemano).
    async fn find_artifact_file(&self, project_id: Uuid, step: usize) -> Result<Option<PathBuf>, PersistenceError> {
        let dir = self.project_dir(project_id);
        let prefix = format!("step_{step}_");
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    async fn next_snapshot_version(&self, project_id: Uuid, step: usize) -> Result<u32, PersistenceError> {
        Ok(self.snapshot_version_list(project_id, step).await?.len() as u32 + 1)
    }

    async fn snapshot_version_list(&self, project_id: Uuid, step: usize) -> Result<Vec<u32>, PersistenceError> {
        let dir = self.project_dir(project_id).join("snapshots");
        let prefix = format!("step_{step}_v");
        let mut versions = Vec::new();
        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if let Some(rest) = name.strip_prefix(&prefix) {
                        if let Some(version) = rest.strip_suffix(".json").and_then(|v| v.parse::<u32>().ok()) {
                            versions.push(version);
                        }
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

#[async_trait]
impl ProjectStore for FsProjectStore {
    async fn create(&self, project: &Project) -> Result<(), EngineError> {
        let dir = self.project_dir(project.id);
        if tokio::fs::try_exists(&dir).await.map_err(PersistenceError::from)? {
            return Err(EngineError::AlreadyExists(project.id.to_string()));
        }
        tokio::fs::create_dir_all(&dir).await.map_err(PersistenceError::from)?;
        let meta = ProjectMetaFile { id: project.id,
                                     name: project.name.clone(),
                                     created_at: project.created_at,
                                     current_step: project.current_step,
                                     completed_steps: project.completed_steps.iter().copied().collect(),
                                     status: project.status };
        Self::write_json(&dir, &dir.join("project.json"), &meta).await.map_err(EngineError::from)?;
        Self::write_json(&dir, &dir.join("initial_brief.json"), &BriefFile { brief: project.seed.clone() })
            .await
            .map_err(EngineError::from)?;
        tracing::info!(project = %project.id, dir = %dir.display(), "project directory created");
        Ok(())
    }

    async fn load(&self, project_id: Uuid) -> Result<Project, EngineError> {
        let dir = self.project_dir(project_id);
        let meta_bytes = match Self::read_bytes(&dir.join("project.json")).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::NotFound(project_id.to_string()));
            }
            Err(err) => return Err(PersistenceError::from(err).into()),
        };
        let meta: ProjectMetaFile =
            serde_json::from_slice(&meta_bytes).map_err(|e| EngineError::Io(format!("project.json corrupt: {e}")))?;
        let brief_bytes = Self::read_bytes(&dir.join("initial_brief.json")).await
                                                                           .map_err(PersistenceError::from)?;
        let brief: BriefFile = serde_json::from_slice(&brief_bytes).map_err(|e| {
                                                                       EngineError::Io(format!("initial_brief.json \
                                                                                                corrupt: {e}"))
                                                                   })?;
        // reconciliar con los artifacts presentes en disco
        let mut completed = std::collections::BTreeSet::new();
        for step in meta.completed_steps {
            if self.find_artifact_file(project_id, step)
                   .await
                   .map_err(EngineError::from)?
                   .is_some()
            {
                completed.insert(step);
            }
        }
        Ok(Project { id: meta.id,
                     name: meta.name,
                     created_at: meta.created_at,
                     seed: brief.brief,
                     current_step: meta.current_step,
                     completed_steps: completed,
                     status: meta.status })
    }

    async fn write_status(&self, project: &Project) -> Result<(), EngineError> {
        let dir = self.project_dir(project.id);
        if !tokio::fs::try_exists(&dir).await.map_err(PersistenceError::from)? {
            return Err(EngineError::NotFound(project.id.to_string()));
        }
        let meta = ProjectMetaFile { id: project.id,
                                     name: project.name.clone(),
                                     created_at: project.created_at,
                                     current_step: project.current_step,
                                     completed_steps: project.completed_steps.iter().copied().collect(),
                                     status: project.status };
        Self::write_json(&dir, &dir.join("project.json"), &meta).await.map_err(EngineError::from)?;
        let snapshot = StatusSnapshot::from(project);
        Self::write_json(&dir, &dir.join("status.json"), &snapshot).await.map_err(EngineError::from)?;
        Ok(())
    }

    async fn read_artifact(&self, project_id: Uuid, step: usize) -> Result<ArtifactEnvelope, EngineError> {
        let Some(path) = self.find_artifact_file(project_id, step).await.map_err(EngineError::from)? else {
            return Err(EngineError::MissingArtifact { step });
        };
        let bytes = Self::read_bytes(&path).await.map_err(PersistenceError::from)?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::CorruptArtifact { step,
                                                                                  detail: e.to_string() })
    }

    async fn write_artifact(&self,
                            project_id: Uuid,
                            artifact: &ArtifactEnvelope,
                            human: Option<&str>)
                            -> Result<(), EngineError> {
        let dir = self.project_dir(project_id);
        let step = artifact.step_index;
        let target = dir.join(format!("step_{step}_{}.json", artifact.step_name));

        // preservar la versión previa como snapshot numerado
        if let Some(existing) = self.find_artifact_file(project_id, step).await.map_err(EngineError::from)? {
            let snapshots = dir.join("snapshots");
            tokio::fs::create_dir_all(&snapshots).await.map_err(PersistenceError::from)?;
            let version = self.next_snapshot_version(project_id, step).await.map_err(EngineError::from)?;
            let snapshot_path = snapshots.join(format!("step_{step}_v{version}.json"));
            tokio::fs::copy(&existing, &snapshot_path).await.map_err(PersistenceError::from)?;
            tracing::debug!(project = %project_id, step, version, "previous artifact snapshotted");
        }

        let bytes = serde_json::to_vec_pretty(artifact).map_err(PersistenceError::from)?;
        Self::atomic_write(&dir, &target, &bytes).await.map_err(EngineError::from)?;
        if let Some(text) = human {
            let text_path = dir.join(format!("step_{step}_{}.txt", artifact.step_name));
            Self::atomic_write(&dir, &text_path, text.as_bytes()).await.map_err(EngineError::from)?;
        }
        Ok(())
    }

    async fn snapshot_versions(&self, project_id: Uuid, step: usize) -> Result<Vec<u32>, EngineError> {
        self.snapshot_version_list(project_id, step).await.map_err(EngineError::from)
    }
}
