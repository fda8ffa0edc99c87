//! Payloads de personajes: pasos 3 (resúmenes), 5 (sinopsis) y 7 (biblias).

use serde::{Deserialize, Serialize};

/// Ficha corta de un personaje (paso 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub ambition: String,
    pub values: Vec<String>,
    pub conflict: String,
    pub epiphany: String,
    pub arc: String,
}

/// Conjunto de fichas del paso 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRoster {
    pub characters: Vec<CharacterSummary>,
}

impl CharacterRoster {
    /// Nombres en orden de aparición.
    pub fn names(&self) -> Vec<&str> {
        self.characters.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.characters.iter().any(|c| c.name == name)
    }
}

/// Sinopsis extendida de un personaje (paso 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSynopsis {
    pub name: String,
    pub synopsis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSynopses {
    pub character_synopses: Vec<CharacterSynopsis>,
}

/// Biblia de personaje (paso 7): el dossier completo que consumen los
/// pasos de escena para voz y continuidad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBible {
    pub name: String,
    pub physical: String,
    pub voice: String,
    pub background: String,
    pub personality: String,
    pub relationships: String,
    pub quirks: Vec<String>,
    pub vulnerabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBibles {
    pub bibles: Vec<CharacterBible>,
}

impl CharacterBibles {
    pub fn contains(&self, name: &str) -> bool {
        self.bibles.iter().any(|b| b.name == name)
    }
}
