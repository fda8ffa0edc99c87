//! Cliente LLM con cadena de candidatos, retries y circuit breaking.
//!
//! `generate` recorre la cadena del tier en orden. Por candidato aplica la
//! política de retry derivada de la clasificación de cada error; agotado un
//! candidato avanza al siguiente (evento `ProviderFallback`). Si la cadena
//! entera se agota, devuelve `AllCandidatesFailed`, salvo que la última
//! falla haya sido permanente (auth), que se surfacea tal cual.

use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{backoff_delay, classify, Candidate, CircuitDecision, CircuitRegistry, CircuitTransition, LlmProvider,
            ModelTier, ProviderError, ProviderRequest, TierChains, TierTimeouts};
use crate::constants::BACKOFF_CAP_SECS;
use crate::errors::EngineError;
use crate::event::{EventScope, PipelineEventKind};

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub user: String,
    pub tier: ModelTier,
    pub max_tokens: u32,
    pub temperature: f32,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub chains: TierChains,
    pub timeouts: TierTimeouts,
}

impl LlmClientConfig {
    pub fn new(chains: TierChains) -> Self {
        Self { chains,
               timeouts: TierTimeouts::default() }
    }
}

pub struct LlmClient {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    config: LlmClientConfig,
    circuits: CircuitRegistry,
}

impl LlmClient {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, config: LlmClientConfig) -> Self {
        let providers = providers.into_iter().map(|p| (p.id().to_string(), p)).collect();
        Self { providers,
               config,
               circuits: CircuitRegistry::default() }
    }

    /// Registro de circuitos (inspección y tests).
    pub fn circuits(&self) -> &CircuitRegistry {
        &self.circuits
    }

    /// Genera texto con el primer candidato disponible del tier.
    pub async fn generate(&self,
                          req: &GenerateRequest,
                          scope: &EventScope,
                          cancel: &CancellationToken)
                          -> Result<GenerateOutput, EngineError> {
        let candidates = self.config.chains.candidates(req.tier);
        if candidates.is_empty() {
            return Err(EngineError::Internal(format!("no candidates configured for tier {}", req.tier)));
        }

        let mut last_error: Option<EngineError> = None;
        for (pos, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match self.circuits.admit(&candidate.provider, &candidate.model, Utc::now()) {
                CircuitDecision::Reject { .. } => {
                    tracing::debug!(provider = %candidate.provider, model = %candidate.model,
                                    "circuit open, skipping candidate");
                    last_error = Some(EngineError::CircuitOpen { provider: candidate.provider.clone(),
                                                                 model: candidate.model.clone() });
                    self.emit_fallback(scope, candidates, pos).await?;
                    continue;
                }
                CircuitDecision::Allow | CircuitDecision::AllowProbe => {}
            }

            match self.try_candidate(req, candidate, scope, cancel).await {
                Ok(output) => return Ok(output),
                Err(err @ EngineError::Cancelled) => return Err(err),
                Err(err) => {
                    last_error = Some(err);
                    self.emit_fallback(scope, candidates, pos).await?;
                }
            }
        }

        match last_error {
            Some(err @ EngineError::Permanent(_)) => Err(err),
            _ => Err(EngineError::AllCandidatesFailed { tier: req.tier }),
        }
    }

    /// Política de retry completa sobre un único candidato.
    async fn try_candidate(&self,
                           req: &GenerateRequest,
                           candidate: &Candidate,
                           scope: &EventScope,
                           cancel: &CancellationToken)
                           -> Result<GenerateOutput, EngineError> {
        let provider = self.providers
                           .get(&candidate.provider)
                           .ok_or_else(|| EngineError::Internal(format!("provider not registered: {}",
                                                                        candidate.provider)))?;
        let timeout = self.config.timeouts.for_tier(req.tier);
        let preq = ProviderRequest { system: req.system.clone(),
                                     user: req.user.clone(),
                                     max_tokens: req.max_tokens,
                                     temperature: req.temperature,
                                     seed: req.seed,
                                     timeout };

        let mut retries: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, provider.call(&candidate.model, &preq)).await {
                Ok(Ok(resp)) => {
                    if let Some(CircuitTransition::Closed) = self.circuits.on_success(&candidate.provider, &candidate.model) {
                        scope.emit(PipelineEventKind::CircuitClosed { provider: candidate.provider.clone(),
                                                                      model: candidate.model.clone() })
                             .await?;
                    }
                    return Ok(GenerateOutput { text: resp.text,
                                               provider: candidate.provider.clone(),
                                               model: candidate.model.clone(),
                                               latency_ms: started.elapsed().as_millis() as u64,
                                               tokens_in: resp.tokens_in,
                                               tokens_out: resp.tokens_out });
                }
                Ok(Err(perr)) => perr,
                Err(_) => ProviderError::timeout(timeout),
            };

            let directive = classify(&outcome);
            tracing::warn!(provider = %candidate.provider, model = %candidate.model,
                           category = ?directive.category, retries, message = %outcome.message,
                           "provider call failed");
            if let Some(CircuitTransition::Opened { open_until }) =
                self.circuits.on_failure(&candidate.provider, &candidate.model, Utc::now())
            {
                scope.emit(PipelineEventKind::CircuitOpened { provider: candidate.provider.clone(),
                                                              model: candidate.model.clone(),
                                                              open_until })
                     .await?;
            }
            let engine_err = directive.to_engine_error(&outcome);
            if !directive.retryable || retries >= directive.max_retries {
                return Err(engine_err);
            }

            let jitter = rand::rng().random_range(0.0..0.1);
            let mut delay = directive.retry_after
                                     .unwrap_or_else(|| backoff_delay(directive.base_delay, retries, jitter));
            delay = delay.min(std::time::Duration::from_secs(BACKOFF_CAP_SECS));
            tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            retries += 1;
        }
    }

    async fn emit_fallback(&self,
                           scope: &EventScope,
                           candidates: &[Candidate],
                           pos: usize)
                           -> Result<(), EngineError> {
        if let Some(next) = candidates.get(pos + 1) {
            let from = &candidates[pos];
            scope.emit(PipelineEventKind::ProviderFallback { from_provider: from.provider.clone(),
                                                             from_model: from.model.clone(),
                                                             to_provider: next.provider.clone(),
                                                             to_model: next.model.clone() })
                 .await?;
        }
        Ok(())
    }
}
