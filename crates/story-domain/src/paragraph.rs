//! Payload del paso 2: párrafo de cinco oraciones con tres desastres.

use serde::{Deserialize, Serialize};

/// Resumen de un párrafo: estructura de cinco oraciones (setup, tres
/// desastres, final) más la premisa moral que pivota en el desastre dos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphSummary {
    pub paragraph: String,
    pub sentences: Vec<String>,
    pub moral_premise: String,
    pub disasters: Vec<String>,
}

impl ParagraphSummary {
    /// Arma el párrafo uniendo las oraciones en orden.
    pub fn from_sentences(sentences: Vec<String>, moral_premise: impl Into<String>, disasters: Vec<String>) -> Self {
        let paragraph = sentences.join(" ");
        Self { paragraph,
               sentences,
               moral_premise: moral_premise.into(),
               disasters }
    }
}
