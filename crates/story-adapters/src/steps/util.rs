//! Helpers compartidos por las definiciones de paso.

use serde::de::DeserializeOwned;
use serde::Serialize;
use story_core::{ParsedPayload, StepContext, ValidationReport};

/// Normaliza un payload leniente al shape canónico del tipo `T`.
///
/// Si el JSON decodifica como `T`, se re-serializa (orden y campos
/// canónicos); si no, se devuelve tal cual y el validador reportará el
/// faltante con un issue accionable.
pub(crate) fn normalize<T>(parsed: ParsedPayload) -> ParsedPayload
    where T: DeserializeOwned + Serialize
{
    if parsed.degraded {
        return parsed;
    }
    match serde_json::from_value::<T>(parsed.value.clone()) {
        Ok(typed) => match serde_json::to_value(&typed) {
            Ok(value) => ParsedPayload::clean(value),
            Err(_) => parsed,
        },
        Err(_) => parsed,
    }
}

/// Anexa la guía editorial de una revisión explícita al prompt de usuario.
pub(crate) fn with_guidance(user: String, ctx: &StepContext) -> String {
    match &ctx.guidance {
        Some(guidance) if !guidance.trim().is_empty() => {
            format!("{user}\n\nEditorial guidance for this revision: {guidance}")
        }
        _ => user,
    }
}

/// Reporta `missing_field` si el valor está vacío.
pub(crate) fn require(report: &mut ValidationReport, field: &str, value: &str) {
    if value.trim().is_empty() {
        report.push("missing_field",
                    format!("field '{field}' is empty"),
                    format!("fill in a non-empty '{field}'"));
    }
}

/// Variante sobre el shape crudo: reporta si el payload no decodifica.
pub(crate) fn shape_issue<T: DeserializeOwned>(payload: &serde_json::Value,
                                               report: &mut ValidationReport,
                                               expected: &str)
                                               -> Option<T> {
    match serde_json::from_value::<T>(payload.clone()) {
        Ok(typed) => Some(typed),
        Err(err) => {
            report.push("schema_shape",
                        format!("payload does not match the {expected} schema: {err}"),
                        format!("respond with a JSON object following the {expected} schema exactly"));
            None
        }
    }
}
