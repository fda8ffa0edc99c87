//! Payloads de sinopsis: paso 4 (una página) y paso 6 (sinopsis larga).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sinopsis de una página (paso 4): cinco párrafos indexados "1".."5",
/// cada uno expandiendo la oración homónima del paso 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSynopsis {
    pub paragraphs: BTreeMap<String, String>,
}

impl PageSynopsis {
    /// Claves esperadas por contrato.
    pub const KEYS: [&'static str; 5] = ["1", "2", "3", "4", "5"];

    pub fn paragraph(&self, key: &str) -> Option<&str> {
        self.paragraphs.get(key).map(String::as_str)
    }
}

/// Sinopsis larga (paso 6): narración continua de 2.500–3.000 palabras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongSynopsis {
    pub long_synopsis: String,
}
