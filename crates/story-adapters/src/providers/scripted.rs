//! Proveedor con guion: responde en orden lo que se le cargó.
//!
//! Determinista y sin red: la herramienta básica de los tests de integración
//! y del binario de demo. Si el guion se agota devuelve un 500, que el
//! reliability layer clasifica como transitorio.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use story_core::{LlmProvider, ProviderError, ProviderRequest, ProviderResponse};

pub struct ScriptedProvider {
    id: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(),
               script: Mutex::new(VecDeque::new()),
               calls: AtomicUsize::new(0) }
    }

    /// Encola una respuesta exitosa.
    pub fn push_ok(&self, text: impl Into<String>) {
        self.script.lock().expect("script lock").push_back(Ok(text.into()));
    }

    /// Encola una falla.
    pub fn push_err(&self, err: ProviderError) {
        self.script.lock().expect("script lock").push_back(Err(err));
    }

    /// Encola `n` veces la misma falla.
    pub fn push_err_times(&self, err: ProviderError, n: usize) {
        let mut script = self.script.lock().expect("script lock");
        for _ in 0..n {
            script.push_back(Err(err.clone()));
        }
    }

    /// Cantidad de llamadas recibidas.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, _model: &str, _req: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Ok(text)) => {
                let tokens_out = text.split_whitespace().count() as u32;
                Ok(ProviderResponse { text,
                                      tokens_in: 0,
                                      tokens_out })
            }
            Some(Err(err)) => Err(err),
            None => Err(ProviderError::status(500, "script exhausted")),
        }
    }
}
