//! Proveedores LLM de prueba y demostración.

mod flaky;
mod scripted;

pub use flaky::FlakyProvider;
pub use scripted::ScriptedProvider;
