//! Interfaz hacia los SDK de proveedores LLM.
//!
//! El core sólo conoce este trait; los adapters concretos (HTTP, mocks de
//! test) viven fuera. `ProviderError` transporta lo mínimo que necesita la
//! clasificación: status HTTP opcional, mensaje y `retry_after`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub seed: Option<u64>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug, Clone, Error)]
#[error("provider error (status {status:?}): {message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status),
               message: message.into(),
               retry_after: None }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self { status: None,
               message: message.into(),
               retry_after: None }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::network(format!("request timed out after {}s", after.as_secs()))
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identificador estable del proveedor ("anthropic", "openai", "mock").
    fn id(&self) -> &str;

    /// Una generación de texto contra `model`. El provider debe respetar
    /// `req.timeout` como presupuesto; el client además lo impone afuera.
    async fn call(&self, model: &str, req: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
