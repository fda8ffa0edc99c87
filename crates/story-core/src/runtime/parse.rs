//! Parse leniente en cuatro niveles del texto crudo del LLM.
//!
//! Orden de intento:
//! 1. parse JSON directo;
//! 2. parse tras quitar cercos de código (```json ... ```);
//! 3. primer bloque `{...}` balanceado dentro de texto libre;
//! 4. extracción por regex de pares clave/valor.
//!
//! Si los cuatro fallan, el crudo se envuelve como `{"content": raw}` y el
//! resultado queda marcado degradado; la validación posterior decide.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::step::ParsedPayload;

static QUOTED_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([A-Za-z_][A-Za-z0-9_]*)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static LINE_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.+)$").unwrap());

/// Aplica la cadena de cuatro niveles sobre `raw`.
pub fn lenient_json(raw: &str) -> ParsedPayload {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() || v.is_array() {
            return ParsedPayload::clean(v);
        }
    }
    if let Some(inner) = strip_code_fences(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(inner.trim()) {
            if v.is_object() || v.is_array() {
                return ParsedPayload::clean(v);
            }
        }
    }
    if let Some(block) = first_json_block(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(block) {
            if v.is_object() {
                return ParsedPayload::clean(v);
            }
        }
    }
    let extracted = extract_named_keys(raw);
    if !extracted.is_empty() {
        return ParsedPayload::clean(Value::Object(extracted));
    }
    ParsedPayload::degraded(json!({ "content": raw }))
}

/// Contenido del primer cerco ``` ... ``` (ignora el tag de lenguaje).
fn strip_code_fences(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_tag = raw[open + 3..].find('\n').map(|n| open + 3 + n + 1)?;
    let close = raw[after_tag..].find("```")?;
    Some(&raw[after_tag..after_tag + close])
}

/// Primer objeto `{...}` balanceado, respetando strings y escapes.
fn first_json_block(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pares clave/valor reconocibles en texto libre.
fn extract_named_keys(raw: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for cap in QUOTED_PAIR_RE.captures_iter(raw) {
        out.insert(cap[1].to_string(), Value::String(cap[2].to_string()));
    }
    if out.is_empty() {
        for cap in LINE_PAIR_RE.captures_iter(raw) {
            out.insert(cap[1].to_string(), Value::String(cap[2].trim().to_string()));
        }
    }
    out
}
