//! Helpers de hash sobre BLAKE3.
//!
//! El algoritmo queda encapsulado acá para poder migrarlo sin tocar el resto
//! del motor. Todos los hashes del pipeline (contenido, upstream, versión de
//! prompt) pasan por estas dos funciones.

use blake3::Hasher;
use serde_json::{json, Value};

use super::to_canonical_json;
use crate::constants::ENGINE_VERSION;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hashea un JSON Value canonicalizándolo primero.
pub fn hash_value(v: &Value) -> String {
    hash_str(&to_canonical_json(v))
}

/// Fingerprint de los insumos de un paso: versión del engine, versión del
/// prompt y hashes de contenido de los padres ordenados lexicográficamente.
///
/// Es función determinista de sus argumentos: el orquestador la recalcula
/// para detectar staleness y debe coincidir con la registrada en el artifact.
pub fn upstream_hash(prompt_version: &str, parent_hashes: &[String]) -> String {
    let mut sorted = parent_hashes.to_vec();
    sorted.sort();
    hash_value(&json!({
        "engine_version": ENGINE_VERSION,
        "prompt_version": prompt_version,
        "parent_hashes": sorted,
    }))
}
