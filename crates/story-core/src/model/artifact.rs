//! Envelope persistido de un artifact de paso.
//!
//! El payload es JSON genérico: el motor no interpreta su semántica, sólo lo
//! hashea canónicamente. El envelope agrega la metadata de procedencia
//! (upstream hash, modelo, intentos, degradación) que usa el orquestador
//! para detectar staleness y los callers para auditar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::ARTIFACT_SCHEMA_VERSION;
use crate::hashing::hash_value;

/// Proveedor y modelo que generaron un artifact. `None` en el envelope
/// significa síntesis determinista (emergency fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub version: u32,
    pub step_index: usize,
    pub step_name: String,
    pub upstream_hash: String,
    pub content_hash: String,
    pub model: Option<ModelDescriptor>,
    pub generated_at: DateTime<Utc>,
    pub degraded: bool,
    pub attempts: u32,
    pub payload: Value,
}

impl ArtifactEnvelope {
    /// Construye el envelope calculando el content hash del payload.
    pub fn new(step_index: usize,
               step_name: &str,
               upstream_hash: String,
               payload: Value,
               model: Option<ModelDescriptor>,
               attempts: u32,
               degraded: bool)
               -> Self {
        let content_hash = hash_value(&payload);
        Self { version: ARTIFACT_SCHEMA_VERSION,
               step_index,
               step_name: step_name.to_string(),
               upstream_hash,
               content_hash,
               model,
               generated_at: Utc::now(),
               degraded,
               attempts,
               payload }
    }

    /// Recalcula el hash del payload y lo compara con el registrado.
    pub fn content_hash_matches(&self) -> bool {
        hash_value(&self.payload) == self.content_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_is_recomputable() {
        let env = ArtifactEnvelope::new(1, "logline", "up".into(), json!({"logline": "x"}), None, 1, false);
        assert!(env.content_hash_matches());
    }

    #[test]
    fn tampered_payload_breaks_hash() {
        let mut env = ArtifactEnvelope::new(1, "logline", "up".into(), json!({"logline": "x"}), None, 1, false);
        env.payload = json!({"logline": "y"});
        assert!(!env.content_hash_matches());
    }
}
