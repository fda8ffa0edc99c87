//! Payload del paso 1: logline de una oración.

use serde::{Deserialize, Serialize};

use crate::text::word_count;

/// Componentes estructurales del logline (quién, qué busca, contra qué).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoglineComponents {
    pub lead: String,
    pub role: String,
    pub goal: String,
    pub opposition: String,
}

/// Resumen de una oración con su conteo de palabras materializado.
///
/// `word_count` se persiste junto al texto para que el artifact sea
/// auto-contenido, pero el validador siempre lo recalcula sobre `logline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logline {
    pub logline: String,
    pub word_count: usize,
    pub components: LoglineComponents,
}

impl Logline {
    /// Construye un logline recalculando el conteo de palabras.
    pub fn new(logline: impl Into<String>, components: LoglineComponents) -> Self {
        let logline = logline.into();
        let word_count = word_count(&logline);
        Self { logline, word_count, components }
    }
}
