//! Payload del paso 0: categoría y promesa al lector.

use serde::{Deserialize, Serialize};

/// Posicionamiento inicial de la historia: categoría comercial, tipo de
/// relato y la lista de "delights" que el público espera del género.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCategory {
    pub category: String,
    pub story_kind: String,
    pub audience_delight: Vec<String>,
}
