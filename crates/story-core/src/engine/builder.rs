//! Builder del `PipelineEngine`.
//!
//! Todas las dependencias son explícitas: stores, registro de pasos, cliente
//! LLM y configuración del runtime. No hay estado global.

use std::sync::Arc;

use super::PipelineEngine;
use crate::errors::EngineError;
use crate::event::EventStore;
use crate::llm::LlmClient;
use crate::registry::StepRegistry;
use crate::runtime::{RuntimeConfig, StepRuntime};
use crate::store::ProjectStore;

#[derive(Default)]
pub struct PipelineEngineBuilder {
    store: Option<Arc<dyn ProjectStore>>,
    events: Option<Arc<dyn EventStore>>,
    registry: Option<Arc<StepRegistry>>,
    llm: Option<Arc<LlmClient>>,
    config: Option<RuntimeConfig>,
}

impl PipelineEngineBuilder {
    pub fn store(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(mut self, registry: Arc<StepRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn llm(mut self, llm: Arc<LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<PipelineEngine, EngineError> {
        let store = self.store.ok_or_else(|| EngineError::Internal("builder: store missing".into()))?;
        let events = self.events.ok_or_else(|| EngineError::Internal("builder: event store missing".into()))?;
        let registry = self.registry.ok_or_else(|| EngineError::Internal("builder: registry missing".into()))?;
        let llm = self.llm.ok_or_else(|| EngineError::Internal("builder: llm client missing".into()))?;
        let runtime = StepRuntime::new(llm, self.config.unwrap_or_default());
        Ok(PipelineEngine::new(store, events, registry, runtime))
    }
}
