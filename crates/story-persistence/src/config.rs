//! Configuración del store desde variables de entorno.
//! Convención: `STORYFLOW_DATA_DIR` apunta al directorio raíz de proyectos.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let root = env::var("STORYFLOW_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        Self { root: PathBuf::from(root) }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}
