//! Reliability layer: una sola operación `generate` que esconde proveedores
//! heterogéneos, reintentos, fallback de candidatos y circuit breaking.

mod circuit;
mod classify;
mod client;
mod cooldown;
mod provider;
mod retry;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{TIMEOUT_BALANCED_SECS, TIMEOUT_FAST_SECS, TIMEOUT_QUALITY_SECS};

pub use circuit::{CircuitDecision, CircuitRegistry, CircuitState, CircuitTransition};
pub use classify::{classify, ErrorCategory, RetryDirective};
pub use client::{GenerateOutput, GenerateRequest, LlmClient, LlmClientConfig};
pub use cooldown::{CooldownEntry, CooldownTracker};
pub use provider::{LlmProvider, ProviderError, ProviderRequest, ProviderResponse};
pub use retry::backoff_delay;

/// Preferencia de calidad/latencia de un paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Quality,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelTier::Fast => "fast",
            ModelTier::Balanced => "balanced",
            ModelTier::Quality => "quality",
        };
        f.write_str(s)
    }
}

/// Un (provider, model) dentro de la cadena de un tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
}

impl Candidate {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider: provider.into(),
               model: model.into() }
    }
}

/// Cadenas de candidatos por tier. Read-only después de la construcción.
#[derive(Debug, Clone, Default)]
pub struct TierChains {
    pub fast: Vec<Candidate>,
    pub balanced: Vec<Candidate>,
    pub quality: Vec<Candidate>,
}

impl TierChains {
    /// Misma cadena para los tres tiers (útil en demos y tests).
    pub fn uniform(candidates: Vec<Candidate>) -> Self {
        Self { fast: candidates.clone(),
               balanced: candidates.clone(),
               quality: candidates }
    }

    pub fn candidates(&self, tier: ModelTier) -> &[Candidate] {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Balanced => &self.balanced,
            ModelTier::Quality => &self.quality,
        }
    }
}

/// Timeout de request por tier. Excederlo clasifica como `network`.
#[derive(Debug, Clone, Copy)]
pub struct TierTimeouts {
    pub fast: Duration,
    pub balanced: Duration,
    pub quality: Duration,
}

impl Default for TierTimeouts {
    fn default() -> Self {
        Self { fast: Duration::from_secs(TIMEOUT_FAST_SECS),
               balanced: Duration::from_secs(TIMEOUT_BALANCED_SECS),
               quality: Duration::from_secs(TIMEOUT_QUALITY_SECS) }
    }
}

impl TierTimeouts {
    pub fn for_tier(&self, tier: ModelTier) -> Duration {
        match tier {
            ModelTier::Fast => self.fast,
            ModelTier::Balanced => self.balanced,
            ModelTier::Quality => self.quality,
        }
    }
}
