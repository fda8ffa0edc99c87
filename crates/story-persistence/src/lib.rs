//! story-persistence: backends durables en filesystem.
//!
//! Implementa los traits de `story-core` sobre un árbol por proyecto:
//!
//! ```text
//! <root>/<project_id>/
//!   project.json
//!   initial_brief.json
//!   status.json
//!   events.log
//!   step_<i>_<name>.json
//!   step_<i>_<name>.txt
//!   snapshots/step_<i>_v<N>.json
//! ```
//!
//! Publicación atómica: temp file + fsync + rename + fsync del directorio.
//! El log de eventos es JSON-lines, append-only, con fsync por evento.

pub mod config;
pub mod error;
pub mod events;
pub mod fs;

pub use config::StoreConfig;
pub use error::PersistenceError;
pub use events::FsEventStore;
pub use fs::FsProjectStore;
