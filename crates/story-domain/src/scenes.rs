//! Payloads de escenas: paso 8 (lista) y paso 9 (briefs por escena).

use serde::{Deserialize, Serialize};

/// Tipo de escena según la alternancia proactiva/reactiva.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneType {
    Proactive,
    Reactive,
}

/// Una escena de la lista maestra (paso 8).
///
/// `index` es 1-based y secuencial; `disaster_anchor` ancla la escena a uno
/// de los tres desastres del paso 2 (1..=3) cuando corresponde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    #[serde(rename = "type")]
    pub scene_type: SceneType,
    pub pov: String,
    pub summary: String,
    pub location: String,
    pub time: String,
    pub word_target: u32,
    pub conflict: String,
    pub disaster_anchor: Option<u8>,
    pub hooks: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneList {
    pub scenes: Vec<Scene>,
}

impl SceneList {
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Suma de los objetivos de palabras de todas las escenas.
    pub fn word_target_total(&self) -> u64 {
        self.scenes.iter().map(|s| u64::from(s.word_target)).sum()
    }
}

/// Cuerpo de un brief según el tipo de escena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SceneBriefBody {
    Proactive {
        goal: String,
        conflict: String,
        setback: String,
        stakes: String,
    },
    Reactive {
        reaction: String,
        dilemma: String,
        decision: String,
        stakes: String,
    },
}

impl SceneBriefBody {
    /// ¿El brief corresponde al tipo de la escena?
    pub fn matches(&self, scene_type: SceneType) -> bool {
        matches!((self, scene_type),
                 (SceneBriefBody::Proactive { .. }, SceneType::Proactive)
                 | (SceneBriefBody::Reactive { .. }, SceneType::Reactive))
    }
}

/// Brief de una escena (paso 9), emparejado posicionalmente con el paso 8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBrief {
    pub scene_index: usize,
    #[serde(flatten)]
    pub body: SceneBriefBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBriefList {
    pub briefs: Vec<SceneBrief>,
}
