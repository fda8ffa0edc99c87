//! Proveedor que falla las primeras N llamadas y después delega.
//!
//! Útil para ejercitar retries, fallback de candidatos y circuit breaking
//! sin depender de un guion exacto.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use story_core::{LlmProvider, ProviderError, ProviderRequest, ProviderResponse};

pub struct FlakyProvider {
    id: String,
    inner: Arc<dyn LlmProvider>,
    failures_left: AtomicUsize,
    fail_with: ProviderError,
}

impl FlakyProvider {
    pub fn new(id: impl Into<String>, inner: Arc<dyn LlmProvider>, failures: usize, fail_with: ProviderError) -> Self {
        Self { id: id.into(),
               inner,
               failures_left: AtomicUsize::new(failures),
               fail_with }
    }
}

#[async_trait]
impl LlmProvider for FlakyProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, model: &str, req: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(self.fail_with.clone());
        }
        self.inner.call(model, req).await
    }
}
