//! Contexto de ejecución entregado a cada paso.
//!
//! Congela los insumos de una corrida: semilla del proyecto, artifacts padre
//! ya leídos y el upstream hash calculado sobre ellos. Los validadores de
//! integridad referencial leen de acá, nunca del store.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use super::ArtifactEnvelope;
use crate::errors::EngineError;

#[derive(Debug, Clone)]
pub struct StepContext {
    /// Brief inicial del proyecto (semilla del paso 0).
    pub seed: String,
    /// Guía opcional del caller en una revisión explícita.
    pub guidance: Option<String>,
    /// Artifacts padre indexados por paso.
    pub parents: BTreeMap<usize, ArtifactEnvelope>,
    /// Fingerprint de insumos de esta corrida.
    pub upstream_hash: String,
}

impl StepContext {
    /// Payload crudo de un padre.
    pub fn parent_payload(&self, step: usize) -> Option<&Value> {
        self.parents.get(&step).map(|a| &a.payload)
    }

    /// Decodifica el payload de un padre a un tipo fuerte.
    pub fn parent_typed<T: DeserializeOwned>(&self, step: usize) -> Result<T, EngineError> {
        let payload = self.parent_payload(step)
                          .ok_or(EngineError::MissingArtifact { step })?;
        serde_json::from_value(payload.clone()).map_err(|e| EngineError::CorruptArtifact { step,
                                                                                           detail: e.to_string() })
    }
}
