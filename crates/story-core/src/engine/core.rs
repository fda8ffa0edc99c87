//! PipelineEngine: el único componente autorizado a mutar `Project`.
//!
//! Ejecuta pasos de a uno (serial dentro del proyecto), resuelve readiness y
//! frescura por upstream hash, cascadea invalidación en revisiones y
//! persiste el estado después de cada transición. Nunca se cae por la falla
//! de un paso: emite `StepFailed`, registra cooldown y corta el pipeline.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;
use crate::event::{EventScope, EventStore, PipelineEventKind};
use crate::hashing::upstream_hash;
use crate::llm::CooldownTracker;
use crate::model::{ArtifactEnvelope, Project, ProjectStatus, StepContext};
use crate::registry::StepRegistry;
use crate::runtime::StepRuntime;
use crate::store::ProjectStore;
use crate::validate::ValidationReport;

pub struct PipelineEngine {
    store: Arc<dyn ProjectStore>,
    events: Arc<dyn EventStore>,
    registry: Arc<StepRegistry>,
    runtime: StepRuntime,
    cooldowns: CooldownTracker,
    active: DashMap<uuid::Uuid, ()>,
    cancellations: DashMap<uuid::Uuid, CancellationToken>,
}

/// Guard RAII de la exclusión por proyecto.
struct RunGuard<'a> {
    active: &'a DashMap<uuid::Uuid, ()>,
    id: uuid::Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

impl PipelineEngine {
    pub fn new(store: Arc<dyn ProjectStore>,
               events: Arc<dyn EventStore>,
               registry: Arc<StepRegistry>,
               runtime: StepRuntime)
               -> Self {
        Self { store,
               events,
               registry,
               runtime,
               cooldowns: CooldownTracker::new(),
               active: DashMap::new(),
               cancellations: DashMap::new() }
    }

    pub fn builder() -> super::PipelineEngineBuilder {
        super::PipelineEngineBuilder::default()
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Alta de un proyecto con su brief inicial.
    pub async fn create_project(&self, name: &str, seed: &str) -> Result<Project, EngineError> {
        let project = Project::new(name, seed);
        self.store.create(&project).await?;
        self.store.write_status(&project).await?;
        self.scope(project.id)
            .emit(PipelineEventKind::ProjectCreated { name: name.to_string() })
            .await?;
        tracing::info!(project = %project.id, name, "project created");
        Ok(project)
    }

    /// Estado actual del proyecto.
    pub async fn status(&self, project_id: uuid::Uuid) -> Result<Project, EngineError> {
        self.store.load(project_id).await
    }

    /// Señala la cancelación de la corrida en curso (si la hay).
    pub fn cancel(&self, project_id: uuid::Uuid) {
        if let Some(token) = self.cancellations.get(&project_id) {
            token.cancel();
            tracing::info!(project = %project_id, "cancellation requested");
        }
    }

    /// Ejecuta un único paso. Precondición: padres presentes.
    pub async fn execute_step(&self, project_id: uuid::Uuid, step: usize) -> Result<ArtifactEnvelope, EngineError> {
        let _guard = self.acquire_run(project_id)?;
        let cancel = self.run_token(project_id);
        let mut project = self.store.load(project_id).await?;
        self.execute_step_inner(&mut project, step, None, false, &cancel).await
    }

    /// Corre el pipeline en orden topológico hasta `up_to` inclusive,
    /// retomando desde el primer paso incompleto o stale.
    pub async fn execute_all(&self, project_id: uuid::Uuid, up_to: usize) -> Result<Project, EngineError> {
        let _guard = self.acquire_run(project_id)?;
        if up_to >= self.registry.len() {
            return Err(EngineError::InvalidStepIndex(up_to));
        }
        let cancel = self.run_token(project_id);
        let mut project = self.store.load(project_id).await?;
        for step in self.registry.topological_order() {
            if step > up_to {
                break;
            }
            if cancel.is_cancelled() {
                project.status = ProjectStatus::Cancelled;
                self.store.write_status(&project).await?;
                self.cancellations.remove(&project_id);
                return Err(EngineError::Cancelled);
            }
            self.execute_step_inner(&mut project, step, None, false, &cancel).await?;
        }
        if project.completed_steps.len() == self.registry.len() && project.status != ProjectStatus::Completed {
            project.status = ProjectStatus::Completed;
            self.store.write_status(&project).await?;
        }
        Ok(project)
    }

    /// Re-corre un paso ya generado: snapshotea el artifact previo, acepta
    /// guía opcional e invalida la descendencia al terminar.
    pub async fn revise_step(&self,
                             project_id: uuid::Uuid,
                             step: usize,
                             guidance: Option<String>)
                             -> Result<ArtifactEnvelope, EngineError> {
        let _guard = self.acquire_run(project_id)?;
        self.registry.descriptor(step)?;
        let cancel = self.run_token(project_id);
        let mut project = self.store.load(project_id).await?;
        let scope = self.scope(project_id);

        let snapshot_version = match self.store.read_artifact(project_id, step).await {
            Ok(_) => Some(self.store.snapshot_versions(project_id, step).await?.len() as u32 + 1),
            Err(EngineError::MissingArtifact { .. }) => None,
            Err(err) => return Err(err),
        };
        scope.emit(PipelineEventKind::RevisionStarted { step_index: step,
                                                        snapshot_version,
                                                        guidance: guidance.clone() })
             .await?;
        let artifact = self.execute_step_inner(&mut project, step, guidance, true, &cancel).await?;
        self.apply_invalidation(&mut project, step, &scope).await?;
        Ok(artifact)
    }

    /// Saca de la completed-set todos los pasos posteriores a `step`. Los
    /// artifacts en disco quedan como historia; sólo dejan de ser "current".
    pub async fn invalidate_downstream(&self, project_id: uuid::Uuid, step: usize) -> Result<Project, EngineError> {
        let _guard = self.acquire_run(project_id)?;
        self.registry.descriptor(step)?;
        let mut project = self.store.load(project_id).await?;
        let scope = self.scope(project_id);
        self.apply_invalidation(&mut project, step, &scope).await?;
        Ok(project)
    }

    /// Re-ejecuta el validador del paso sobre el artifact persistido.
    pub async fn validate_only(&self, project_id: uuid::Uuid, step: usize) -> Result<ValidationReport, EngineError> {
        let desc = self.registry.descriptor(step)?;
        let project = self.store.load(project_id).await?;
        let artifact = self.store.read_artifact(project_id, step).await?;
        let (parents, missing) = self.read_parents(project_id, step).await?;
        if !missing.is_empty() {
            return Err(EngineError::UnsatisfiedDependencies { step, missing });
        }
        let ctx = StepContext { seed: project.seed,
                                guidance: None,
                                parents,
                                upstream_hash: artifact.upstream_hash.clone() };
        Ok(desc.definition.validate(&artifact.payload, &ctx))
    }

    fn scope(&self, project_id: uuid::Uuid) -> EventScope {
        EventScope::new(self.events.clone(), project_id)
    }

    fn acquire_run(&self, project_id: uuid::Uuid) -> Result<RunGuard<'_>, EngineError> {
        match self.active.entry(project_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::Busy),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(RunGuard { active: &self.active,
                              id: project_id })
            }
        }
    }

    /// Token de cancelación vigente; renueva los ya consumidos.
    fn run_token(&self, project_id: uuid::Uuid) -> CancellationToken {
        let current = self.cancellations
                          .entry(project_id)
                          .or_insert_with(CancellationToken::new)
                          .clone();
        if current.is_cancelled() {
            let fresh = CancellationToken::new();
            self.cancellations.insert(project_id, fresh.clone());
            fresh
        } else {
            current
        }
    }

    async fn read_parents(&self,
                          project_id: uuid::Uuid,
                          step: usize)
                          -> Result<(BTreeMap<usize, ArtifactEnvelope>, Vec<usize>), EngineError> {
        let mut parents = BTreeMap::new();
        let mut missing = Vec::new();
        for &parent in self.registry.parents(step) {
            match self.store.read_artifact(project_id, parent).await {
                Ok(artifact) => {
                    parents.insert(parent, artifact);
                }
                Err(EngineError::MissingArtifact { .. }) => missing.push(parent),
                Err(err) => return Err(err),
            }
        }
        Ok((parents, missing))
    }

    async fn apply_invalidation(&self,
                                project: &mut Project,
                                step: usize,
                                scope: &EventScope)
                                -> Result<(), EngineError> {
        // invalidación conservadora: todo índice posterior sale de la
        // completed-set, aunque no sea descendiente transitivo; la frescura
        // por upstream hash hace que los no-descendientes se re-acepten sin
        // regenerar
        let before = project.completed_steps.len();
        project.completed_steps.retain(|s| *s <= step);
        project.current_step = step;
        if project.status == ProjectStatus::Completed && project.completed_steps.len() < self.registry.len() {
            project.status = ProjectStatus::Running;
        }
        self.store.write_status(project).await?;
        if project.completed_steps.len() != before {
            tracing::info!(project = %project.id, step, invalidated = before - project.completed_steps.len(),
                           "downstream steps invalidated");
        }
        scope.emit(PipelineEventKind::Checkpoint { completed_steps: project.completed_steps.iter().copied().collect(),
                                                   current_step: step })
             .await?;
        Ok(())
    }

    /// Corrida de un paso: readiness → frescura → runtime → persistencia.
    async fn execute_step_inner(&self,
                                project: &mut Project,
                                step: usize,
                                guidance: Option<String>,
                                force: bool,
                                cancel: &CancellationToken)
                                -> Result<ArtifactEnvelope, EngineError> {
        let desc = self.registry.descriptor(step)?;
        let scope = self.scope(project.id);
        self.cooldowns.check(project.id, step, Utc::now())?;

        let (parents, missing) = self.read_parents(project.id, step).await?;
        if !missing.is_empty() {
            return Err(EngineError::UnsatisfiedDependencies { step, missing });
        }
        let parent_hashes: Vec<String> = parents.values().map(|a| a.content_hash.clone()).collect();
        let upstream = upstream_hash(desc.definition.prompt_version(), &parent_hashes);

        if !force {
            match self.store.read_artifact(project.id, step).await {
                Ok(existing) if existing.upstream_hash == upstream => {
                    // fresco: se devuelve el artifact cacheado; si una
                    // invalidación lo sacó de la completed-set, se re-adopta
                    // sin regenerar
                    if !project.is_completed(step) {
                        project.completed_steps.insert(step);
                        self.store.write_status(project).await?;
                    }
                    tracing::debug!(project = %project.id, step, "artifact fresh, skipping");
                    return Ok(existing);
                }
                Ok(_) => {} // stale: se re-corre y el store snapshotea al sobrescribir
                Err(EngineError::MissingArtifact { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        scope.emit(PipelineEventKind::StepStarted { step_index: step,
                                                    step_name: desc.name.to_string() })
             .await?;
        project.status = ProjectStatus::Running;
        project.current_step = step;
        self.store.write_status(project).await?;

        let ctx = StepContext { seed: project.seed.clone(),
                                guidance,
                                parents,
                                upstream_hash: upstream.clone() };
        match self.runtime.execute(desc, &ctx, &scope, cancel).await {
            Ok(outcome) => {
                let envelope = ArtifactEnvelope::new(step,
                                                     desc.name,
                                                     upstream,
                                                     outcome.payload,
                                                     outcome.model,
                                                     outcome.attempts,
                                                     outcome.degraded);
                let human = desc.definition.render_text(&envelope.payload);
                self.store.write_artifact(project.id, &envelope, human.as_deref()).await?;
                project.completed_steps.insert(step);
                if project.completed_steps.len() == self.registry.len() {
                    project.status = ProjectStatus::Completed;
                }
                self.store.write_status(project).await?;
                self.cooldowns.clear(project.id, step);
                scope.emit(PipelineEventKind::StepCompleted { step_index: step,
                                                              step_name: desc.name.to_string(),
                                                              content_hash: envelope.content_hash.clone(),
                                                              upstream_hash: envelope.upstream_hash.clone(),
                                                              model: envelope.model.clone(),
                                                              attempts: envelope.attempts,
                                                              degraded: envelope.degraded })
                     .await?;
                scope.emit(PipelineEventKind::Checkpoint { completed_steps: project.completed_steps
                                                                                   .iter()
                                                                                   .copied()
                                                                                   .collect(),
                                                           current_step: step })
                     .await?;
                Ok(envelope)
            }
            Err(EngineError::Cancelled) => {
                scope.emit(PipelineEventKind::StepCancelled { step_index: step }).await?;
                project.status = ProjectStatus::Cancelled;
                self.store.write_status(project).await?;
                self.cancellations.remove(&project.id);
                Err(EngineError::Cancelled)
            }
            Err(err) => {
                scope.emit(PipelineEventKind::StepFailed { step_index: step,
                                                           step_name: desc.name.to_string(),
                                                           error: err.clone() })
                     .await?;
                if err.is_recoverable() {
                    self.cooldowns.record_failure(project.id, step, Utc::now());
                }
                project.status = ProjectStatus::Failed;
                self.store.write_status(project).await?;
                Err(err)
            }
        }
    }
}
