//! Payload del paso 10: manuscrito completo por capítulos.

use serde::{Deserialize, Serialize};

use crate::text::word_count;

/// Prosa de una escena con su conteo de palabras materializado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneProse {
    pub prose: String,
    pub word_count: usize,
}

impl SceneProse {
    pub fn new(prose: impl Into<String>) -> Self {
        let prose = prose.into();
        let word_count = word_count(&prose);
        Self { prose, word_count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub scenes: Vec<SceneProse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manuscript {
    pub chapters: Vec<Chapter>,
    pub total_word_count: usize,
}

impl Manuscript {
    /// Construye el manuscrito recomputando el total desde las escenas.
    pub fn from_chapters(chapters: Vec<Chapter>) -> Self {
        let total_word_count = chapters.iter()
                                       .flat_map(|c| c.scenes.iter())
                                       .map(|s| s.word_count)
                                       .sum();
        Self { chapters, total_word_count }
    }

    /// Cantidad de escenas a través de todos los capítulos.
    pub fn scene_count(&self) -> usize {
        self.chapters.iter().map(|c| c.scenes.len()).sum()
    }
}
