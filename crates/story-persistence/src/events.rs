//! `FsEventStore`: log de eventos JSON-lines, append-only y fsynced.
//!
//! Un mutex por proyecto serializa appends y protege el contador de `seq`
//! (inicializado en el primer acceso contando las líneas existentes). Entre
//! proyectos los appends son independientes.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use story_core::{EngineError, EventStore, PipelineEvent, PipelineEventKind};

use crate::error::PersistenceError;
use crate::StoreConfig;

pub struct FsEventStore {
    root: PathBuf,
    /// Estado por proyecto: próximo seq, `None` hasta leer el log existente.
    locks: DashMap<Uuid, Arc<Mutex<Option<u64>>>>,
}

impl FsEventStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { root: config.root,
               locks: DashMap::new() }
    }

    fn log_path(&self, project_id: Uuid) -> PathBuf {
        self.root.join(project_id.to_string()).join("events.log")
    }

    fn lock_for(&self, project_id: Uuid) -> Arc<Mutex<Option<u64>>> {
        self.locks.entry(project_id).or_insert_with(|| Arc::new(Mutex::new(None))).clone()
    }

    async fn read_events(path: &PathBuf) -> Result<Vec<PipelineEvent>, PersistenceError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }
}

#[async_trait]
impl EventStore for FsEventStore {
    async fn append_kind(&self, project_id: Uuid, kind: PipelineEventKind) -> Result<PipelineEvent, EngineError> {
        let lock = self.lock_for(project_id);
        let mut next_seq = lock.lock().await;
        let path = self.log_path(project_id);
        if next_seq.is_none() {
            let existing = Self::read_events(&path).await.map_err(EngineError::from)?;
            *next_seq = Some(existing.len() as u64);
        }
        let seq = next_seq.unwrap_or(0);
        let event = PipelineEvent { seq,
                                    project_id,
                                    kind,
                                    ts: Utc::now() };
        let mut line = serde_json::to_string(&event).map_err(PersistenceError::from)?;
        line.push('\n');
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(PersistenceError::from)?;
        }
        let mut file = tokio::fs::OpenOptions::new().create(true)
                                                    .append(true)
                                                    .open(&path)
                                                    .await
                                                    .map_err(PersistenceError::from)?;
        file.write_all(line.as_bytes()).await.map_err(PersistenceError::from)?;
        file.sync_data().await.map_err(PersistenceError::from)?;
        *next_seq = Some(seq + 1);
        Ok(event)
    }

    async fn list(&self, project_id: Uuid) -> Result<Vec<PipelineEvent>, EngineError> {
        let lock = self.lock_for(project_id);
        let _guard = lock.lock().await;
        Self::read_events(&self.log_path(project_id)).await.map_err(EngineError::from)
    }
}
