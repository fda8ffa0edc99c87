//! Contrato de un paso: prompt → parse → validate → fallback.
//!
//! Reglas clave:
//! - Todo es determinista salvo la llamada al LLM (que vive fuera, en el
//!   reliability layer): mismo contexto ⇒ mismo plan, mismo payload ⇒ mismo
//!   reporte de validación.
//! - El parse nunca lanza: ante texto irrecuperable envuelve el crudo como
//!   `{"content": raw}` y marca `degraded`.
//! - `fallback` sintetiza un payload mínimo desde los padres cuando el paso
//!   lo permite; devolver `None` significa "sin fallback".

use serde_json::Value;

use crate::errors::EngineError;
use crate::model::StepContext;
use crate::validate::ValidationReport;

/// Prompt listo para enviar: texto de sistema + texto de usuario.
#[derive(Debug, Clone)]
pub struct PromptBundle {
    pub system: String,
    pub user: String,
}

/// Sub-prompt de un paso con fanout (una escena, un personaje, ...).
#[derive(Debug, Clone)]
pub struct SubPrompt {
    /// Etiqueta humana para logs ("scene 12").
    pub label: String,
    pub prompt: PromptBundle,
}

/// Plan de ejecución que el paso deriva de su contexto.
#[derive(Debug, Clone)]
pub enum StepPlan {
    /// Una sola generación cubre el paso completo.
    Single { prompt: PromptBundle },
    /// N generaciones independientes que luego se ensamblan en orden.
    Fanout { subtasks: Vec<SubPrompt> },
}

/// Payload parseado con la marca de degradación del parse.
#[derive(Debug, Clone)]
pub struct ParsedPayload {
    pub value: Value,
    pub degraded: bool,
}

impl ParsedPayload {
    pub fn clean(value: Value) -> Self {
        Self { value, degraded: false }
    }

    pub fn degraded(value: Value) -> Self {
        Self { value, degraded: true }
    }
}

pub trait StepDefinition: Send + Sync {
    /// Hash estable del texto fuente de los templates de prompt. Cambiarlo
    /// invalida la frescura de los artifacts generados con la versión previa.
    fn prompt_version(&self) -> &str;

    /// Deriva el plan de ejecución desde los payloads padre.
    fn plan(&self, ctx: &StepContext) -> Result<StepPlan, EngineError>;

    /// Parse del texto crudo del LLM al payload del paso.
    fn parse(&self, raw: &str) -> ParsedPayload;

    /// Parse de la sub-tarea `sub` en pasos con fanout.
    fn parse_sub(&self, _sub: usize, raw: &str) -> ParsedPayload {
        self.parse(raw)
    }

    /// Validación del artifact completo contra sus insumos congelados.
    fn validate(&self, payload: &Value, ctx: &StepContext) -> ValidationReport;

    /// Validación de un sub-resultado individual.
    fn validate_sub(&self, _sub: usize, _payload: &Value, _ctx: &StepContext) -> ValidationReport {
        ValidationReport::ok()
    }

    /// Ensambla los sub-resultados (en orden de input) en el payload final.
    fn assemble(&self, _ctx: &StepContext, _subs: Vec<Value>) -> Result<Value, EngineError> {
        Err(EngineError::Internal("step does not fan out".into()))
    }

    /// Síntesis determinista de emergencia para el paso completo.
    fn fallback(&self, _ctx: &StepContext) -> Option<Value> {
        None
    }

    /// Síntesis determinista de emergencia para una sub-tarea.
    fn fallback_sub(&self, _ctx: &StepContext, _sub: usize) -> Option<Value> {
        None
    }

    /// Rendering legible del payload (sibling `.txt` del artifact).
    fn render_text(&self, _payload: &Value) -> Option<String> {
        None
    }
}
