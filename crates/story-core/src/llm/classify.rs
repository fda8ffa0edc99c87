//! Clasificación de errores de proveedor en directivas de retry.
//!
//! La tabla es contrato (ver errores del core): status HTTP y señales de red
//! se mapean a una categoría con flag de retry, delay base y tope de
//! reintentos. Lo no clasificable se trata como transitorio con tope bajo.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ProviderError;
use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    RateLimit,
    InvalidInput,
    Transient,
    Permanent,
    Unknown,
}

/// Directiva derivada de un error: cómo y cuántas veces reintentar.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryDirective {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub base_delay: Duration,
    /// Reintentos permitidos después del intento inicial.
    pub max_retries: u32,
    /// `Retry-After` del proveedor, si vino.
    pub retry_after: Option<Duration>,
}

impl RetryDirective {
    fn new(category: ErrorCategory, retryable: bool, base_delay_secs: u64, max_retries: u32) -> Self {
        Self { category,
               retryable,
               base_delay: Duration::from_secs(base_delay_secs),
               max_retries,
               retry_after: None }
    }

    /// Error del core correspondiente a la categoría, con el mensaje crudo.
    pub fn to_engine_error(&self, source: &ProviderError) -> EngineError {
        let msg = source.message.clone();
        match self.category {
            ErrorCategory::Network => EngineError::Network(msg),
            ErrorCategory::RateLimit => EngineError::RateLimit(msg),
            ErrorCategory::InvalidInput => EngineError::InvalidInput(msg),
            ErrorCategory::Transient => EngineError::Transient(msg),
            ErrorCategory::Permanent => EngineError::Permanent(msg),
            ErrorCategory::Unknown => EngineError::Unknown(msg),
        }
    }
}

fn looks_like_network(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("timed out")
    || m.contains("timeout")
    || m.contains("connection refused")
    || m.contains("connection reset")
    || m.contains("broken pipe")
}

/// Aplica la tabla de clasificación a un error de proveedor.
pub fn classify(err: &ProviderError) -> RetryDirective {
    let mut directive = match err.status {
        Some(429) => RetryDirective::new(ErrorCategory::RateLimit, true, 30, 5),
        Some(400) => RetryDirective::new(ErrorCategory::InvalidInput, false, 0, 0),
        Some(401) | Some(403) => RetryDirective::new(ErrorCategory::Permanent, false, 0, 0),
        Some(500) | Some(502) | Some(503) | Some(504) => RetryDirective::new(ErrorCategory::Transient, true, 2, 3),
        Some(_) => RetryDirective::new(ErrorCategory::Unknown, true, 2, 2),
        None if looks_like_network(&err.message) => RetryDirective::new(ErrorCategory::Network, true, 1, 5),
        None => RetryDirective::new(ErrorCategory::Unknown, true, 2, 2),
    };
    if directive.category == ErrorCategory::RateLimit {
        directive.retry_after = err.retry_after;
    }
    directive
}
