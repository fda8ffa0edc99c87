//! Descriptor estático de un paso registrado.

use std::sync::Arc;

use super::StepDefinition;
use crate::llm::ModelTier;

/// Fila de la tabla de pasos: índice, dependencias, preferencias de modelo y
/// la implementación concreta del contrato.
#[derive(Clone)]
pub struct StepDescriptor {
    pub index: usize,
    pub name: &'static str,
    /// Índices de los pasos padre. Siempre menores que `index`.
    pub parents: &'static [usize],
    pub tier: ModelTier,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Habilita la ejecución por sub-tareas concurrentes.
    pub fanout: bool,
    /// Habilita la síntesis de emergencia a nivel de paso.
    pub allow_fallback: bool,
    pub definition: Arc<dyn StepDefinition>,
}

impl std::fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDescriptor")
         .field("index", &self.index)
         .field("name", &self.name)
         .field("parents", &self.parents)
         .field("tier", &self.tier)
         .field("fanout", &self.fanout)
         .field("allow_fallback", &self.allow_fallback)
         .finish()
    }
}
