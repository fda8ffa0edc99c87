//! Fanout: sub-generaciones concurrentes dentro de un paso.
//!
//! Cada sub-tarea es un mini template-method (prompt → generar → parse →
//! validar → revisar → fallback propio). El semáforo acota la concurrencia;
//! el ensamblado preserva el orden de input aunque las terminaciones se
//! intercalen. La cancelación se observa al inicio de cada sub-tarea y
//! dentro del reliability layer; si se observó, el paso no escribe artifact.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{revision_prompt, RuntimeConfig, StepOutcome};
use crate::errors::EngineError;
use crate::event::{EventScope, PipelineEventKind};
use crate::llm::{GenerateRequest, LlmClient};
use crate::model::{ModelDescriptor, StepContext};
use crate::step::{StepDescriptor, SubPrompt};
use crate::validate::ValidationIssue;

struct SubResult {
    value: Value,
    model: Option<ModelDescriptor>,
    degraded: bool,
}

pub(crate) async fn run_fanout(llm: Arc<LlmClient>,
                               config: &RuntimeConfig,
                               desc: &StepDescriptor,
                               ctx: &StepContext,
                               subtasks: Vec<SubPrompt>,
                               scope: &EventScope,
                               cancel: &CancellationToken)
                               -> Result<StepOutcome, EngineError> {
    let total = subtasks.len();
    if total == 0 {
        return Err(EngineError::Internal("fanout plan produced zero subtasks".into()));
    }
    let ctx_shared = Arc::new(ctx.clone());
    let semaphore = Arc::new(Semaphore::new(config.fanout_concurrency));
    let mut join = JoinSet::new();
    for (idx, sub) in subtasks.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let scope = scope.clone();
        let llm = llm.clone();
        let desc = desc.clone();
        let ctx = ctx_shared.clone();
        let max_attempts = config.max_attempts;
        join.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (idx, Err(EngineError::Cancelled)),
            };
            if cancel.is_cancelled() {
                return (idx, Err(EngineError::Cancelled));
            }
            (idx, run_subtask(&llm, &desc, &ctx, idx, sub, &scope, &cancel, max_attempts).await)
        });
    }

    let mut slots: Vec<Option<SubResult>> = (0..total).map(|_| None).collect();
    let mut completed = 0usize;
    let mut last_error: Option<EngineError> = None;
    while let Some(joined) = join.join_next().await {
        let (idx, outcome) = joined.map_err(|e| EngineError::Internal(format!("subtask join error: {e}")))?;
        match outcome {
            Ok(sub) => slots[idx] = Some(sub),
            Err(err) => last_error = Some(err),
        }
        completed += 1;
        if completed % config.progress_every == 0 && completed < total {
            scope.emit(PipelineEventKind::StepProgress { step_index: desc.index,
                                                         completed,
                                                         total })
                 .await?;
        }
    }
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let filled = slots.iter().filter(|s| s.is_some()).count();
    if filled == 0 {
        return Err(last_error.unwrap_or(EngineError::AllCandidatesFailed { tier: desc.tier }));
    }
    if filled < total {
        // sub-tareas sin resultado ni fallback: imposible ensamblar en orden
        return Err(last_error.unwrap_or_else(|| EngineError::Internal("incomplete fanout assembly".into())));
    }

    let degraded = slots.iter().flatten().any(|s| s.degraded);
    let model = slots.iter().flatten().filter_map(|s| s.model.clone()).next_back();
    let values: Vec<Value> = slots.into_iter().flatten().map(|s| s.value).collect();
    let payload = desc.definition.assemble(&ctx_shared, values)?;
    let report = desc.definition.validate(&payload, &ctx_shared);
    if !report.is_ok() {
        scope.emit(PipelineEventKind::ValidationFailed { step_index: desc.index,
                                                         attempt: 1,
                                                         issues: report.issues.clone() })
             .await?;
        if desc.allow_fallback {
            if let Some(payload) = desc.definition.fallback(&ctx_shared) {
                tracing::info!(step = desc.index, "emergency fallback engaged after assembly");
                return Ok(StepOutcome { payload,
                                        model: None,
                                        attempts: 1,
                                        degraded: true });
            }
        }
        return Err(EngineError::Validation { step: desc.index,
                                             attempts: 1,
                                             issues: report.issues });
    }
    Ok(StepOutcome { payload,
                     model,
                     attempts: 1,
                     degraded })
}

/// Mini template-method de una sub-tarea.
#[allow(clippy::too_many_arguments)]
async fn run_subtask(llm: &LlmClient,
                     desc: &StepDescriptor,
                     ctx: &StepContext,
                     idx: usize,
                     sub: SubPrompt,
                     scope: &EventScope,
                     cancel: &CancellationToken,
                     max_attempts: u32)
                     -> Result<SubResult, EngineError> {
    let SubPrompt { label, prompt } = sub;
    let base = prompt.clone();
    let mut prompt = prompt;
    let mut attempts: u32 = 0;
    let mut last_issues: Vec<ValidationIssue> = Vec::new();
    let mut generation_error: Option<EngineError> = None;

    while attempts < max_attempts {
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
        match llm.generate(&req, scope, cancel).await {
            Ok(out) => {
                // resultado en vuelo descartado si ya se observó cancelación
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let parsed = desc.definition.parse_sub(idx, &out.text);
                let report = desc.definition.validate_sub(idx, &parsed.value, ctx);
                if report.is_ok() && !parsed.degraded {
                    return Ok(SubResult { value: parsed.value,
                                          model: Some(ModelDescriptor { provider: out.provider,
                                                                        model: out.model }),
                                          degraded: false });
                }
                tracing::debug!(step = desc.index, sub = idx, label = %label, attempt = attempts,
                                "subtask failed validation");
                let issues = report.issues;
                if attempts < max_attempts {
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

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if let Some(value) = desc.definition.fallback_sub(ctx, idx) {
        tracing::debug!(step = desc.index, sub = idx, label = %label, "subtask fallback engaged");
        return Ok(SubResult { value,
                              model: None,
                              degraded: true });
    }
    Err(match generation_error {
        Some(err) => err,
        None => EngineError::Validation { step: desc.index,
                                         attempts,
                                         issues: last_issues },
    })
}
