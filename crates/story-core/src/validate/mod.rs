//! Framework de validación: reportes estructurados que alimentan el loop de
//! revisión.
//!
//! Cada paso aporta su validador como función pura sobre el payload parseado
//! y sus insumos congelados (los artifacts padre). Un reporte con issues no
//! es excepción: el runtime lo convierte en un prompt de revisión usando
//! `code` (identificador estable) y `suggested_fix`.

use serde::{Deserialize, Serialize};

/// Un problema concreto detectado por un validador.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Código estable (p. ej. "word_count", "scene_count"). Lo consume la
    /// composición del prompt de revisión y los tests.
    pub code: String,
    pub message: String,
    pub suggested_fix: String,
}

impl ValidationIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>, suggested_fix: impl Into<String>) -> Self {
        Self { code: code.into(),
               message: message.into(),
               suggested_fix: suggested_fix.into() }
    }
}

/// Resultado de validar un payload: aceptación o lista de issues accionables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Reporte vacío (aceptación).
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, code: &str, message: impl Into<String>, suggested_fix: impl Into<String>) {
        self.issues.push(ValidationIssue::new(code, message, suggested_fix));
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_ok() {
        assert!(ValidationReport::ok().is_ok());
    }

    #[test]
    fn push_collects_issues_in_order() {
        let mut r = ValidationReport::ok();
        r.push("word_count", "too long", "shorten it");
        r.push("missing_field", "no goal", "add a goal");
        assert!(!r.is_ok());
        assert_eq!(r.issues[0].code, "word_count");
        assert_eq!(r.issues[1].code, "missing_field");
    }
}
