//! Runtime de pasos: el template method uniforme de los 11 pasos.
//!
//! Secuencia exacta por paso: componer insumos → armar prompt → generar →
//! parse leniente → validar → loop de revisión acotado → fallback de
//! emergencia (si el paso lo permite) → entregar el outcome al orquestador,
//! que persiste. Los pasos con fanout ejecutan N mini-template-methods
//! concurrentes y ensamblan en orden de input.

mod fanout;
mod parse;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::constants::{DEFAULT_FANOUT_CONCURRENCY, MAX_GENERATION_ATTEMPTS, PROGRESS_EVERY};
use crate::errors::EngineError;
use crate::event::{EventScope, PipelineEventKind};
use crate::llm::{GenerateRequest, LlmClient};
use crate::model::{ModelDescriptor, StepContext};
use crate::step::{PromptBundle, StepDescriptor, StepPlan};
use crate::validate::ValidationIssue;

pub use parse::lenient_json;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Generaciones por paso: inicial + revisiones.
    pub max_attempts: u32,
    pub fanout_concurrency: usize,
    pub progress_every: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_attempts: MAX_GENERATION_ATTEMPTS,
               fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
               progress_every: PROGRESS_EVERY }
    }
}

/// Resultado de una corrida de paso, listo para envolver y persistir.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub payload: serde_json::Value,
    pub model: Option<ModelDescriptor>,
    pub attempts: u32,
    pub degraded: bool,
}

pub struct StepRuntime {
    llm: Arc<LlmClient>,
    config: RuntimeConfig,
}

impl StepRuntime {
    pub fn new(llm: Arc<LlmClient>, config: RuntimeConfig) -> Self {
        Self { llm, config }
    }

    pub async fn execute(&self,
                         desc: &StepDescriptor,
                         ctx: &StepContext,
                         scope: &EventScope,
                         cancel: &CancellationToken)
                         -> Result<StepOutcome, EngineError> {
        match desc.definition.plan(ctx)? {
            StepPlan::Single { prompt } => self.run_single(desc, ctx, prompt, scope, cancel).await,
            StepPlan::Fanout { subtasks } => {
                fanout::run_fanout(self.llm.clone(), &self.config, desc, ctx, subtasks, scope, cancel).await
            }
        }
    }

    /// Generación única con loop de revisión acotado.
    async fn run_single(&self,
                        desc: &StepDescriptor,
                        ctx: &StepContext,
                        prompt: PromptBundle,
                        scope: &EventScope,
                        cancel: &CancellationToken)
                        -> Result<StepOutcome, EngineError> {
        let base = prompt.clone();
        let mut prompt = prompt;
        let mut attempts: u32 = 0;
        let mut last_issues: Vec<ValidationIssue> = Vec::new();
        let mut generation_error: Option<EngineError> = None;

        while attempts < self.config.max_attempts {
            attempts += 1;
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let req = GenerateRequest { system: prompt.system.clone(),
                                        user: prompt.user.clone(),
                                        tier: desc.tier,
                                        max_tokens: desc.max_tokens,
                                        temperature: desc.temperature,
                                        seed: None };
            match self.llm.generate(&req, scope, cancel).await {
                Ok(out) => {
                    // la llamada en vuelo termina, pero su resultado se
                    // descarta si la cancelación ya fue observada
                    if cancel.is_cancelled() {
                        return Err(EngineError::Cancelled);
                    }
                    let parsed = desc.definition.parse(&out.text);
                    let report = desc.definition.validate(&parsed.value, ctx);
                    if report.is_ok() && !parsed.degraded {
                        return Ok(StepOutcome { payload: parsed.value,
                                                model: Some(ModelDescriptor { provider: out.provider,
                                                                              model: out.model }),
                                                attempts,
                                                degraded: false });
                    }
                    let mut issues = report.issues;
                    if parsed.degraded && issues.is_empty() {
                        issues.push(ValidationIssue::new("parse_degraded",
                                                         "the output was not structured",
                                                         "respond with a single valid JSON object"));
                    }
                    scope.emit(PipelineEventKind::ValidationFailed { step_index: desc.index,
                                                                     attempt: attempts,
                                                                     issues: issues.clone() })
                         .await?;
                    if attempts < self.config.max_attempts {
                        prompt = revision_prompt(&base, &parsed.value, &issues);
                    }
                    last_issues = issues;
                }
                Err(err @ EngineError::Cancelled) => return Err(err),
                Err(err) => {
                    generation_error = Some(err);
                    break;
                }
            }
        }

        if desc.allow_fallback {
            if let Some(payload) = desc.definition.fallback(ctx) {
                tracing::info!(step = desc.index, "emergency fallback engaged");
                return Ok(StepOutcome { payload,
                                        model: None,
                                        attempts,
                                        degraded: true });
            }
        }
        Err(match generation_error {
            Some(err) => err,
            None => EngineError::Validation { step: desc.index,
                                             attempts,
                                             issues: last_issues },
        })
    }
}

/// Prompt de revisión: output previo + issues + fixes sugeridos.
pub(crate) fn revision_prompt(base: &PromptBundle,
                              previous: &serde_json::Value,
                              issues: &[ValidationIssue])
                              -> PromptBundle {
    let mut fixes = String::new();
    for issue in issues {
        fixes.push_str(&format!("- [{}] {}. Fix: {}\n", issue.code, issue.message, issue.suggested_fix));
    }
    let previous_pretty = serde_json::to_string_pretty(previous).unwrap_or_else(|_| previous.to_string());
    PromptBundle { system: base.system.clone(),
                   user: format!("{}\n\nYour previous answer was:\n{}\n\nIt failed validation:\n{}\nProduce a corrected, \
                                  complete answer. Respond with valid JSON only.",
                                 base.user, previous_pretty, fixes) }
}
