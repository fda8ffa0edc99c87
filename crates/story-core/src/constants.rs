//! Constantes del motor.
//!
//! Valores que participan del contrato observable: límites del loop de
//! revisión, umbrales del circuit breaker, agenda de cooldown y timeouts por
//! tier. `ENGINE_VERSION` entra en los hashes de fingerprint: subirla
//! invalida la frescura de artifacts previos de forma deliberada.

/// Versión lógica del motor. Participa del upstream hash.
pub const ENGINE_VERSION: &str = "1.0";

/// Versión del envelope de artifact persistido.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Intentos de generación por paso (inicial + revisiones).
pub const MAX_GENERATION_ATTEMPTS: u32 = 3;

/// Sub-tareas concurrentes por defecto dentro de un paso con fanout.
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 8;

/// Cada cuántas sub-tareas completadas se emite `StepProgress`.
pub const PROGRESS_EVERY: usize = 4;

/// Fallas consecutivas que abren el circuito de un (provider, model).
pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 5;

/// Ventana en segundos que el circuito permanece abierto.
pub const CIRCUIT_OPEN_SECS: u64 = 300;

/// Tope por intento del delay de backoff.
pub const BACKOFF_CAP_SECS: u64 = 60;

/// Agenda de cooldown por (project, step): racha de fallas → espera.
pub const COOLDOWN_SCHEDULE_SECS: [u64; 8] = [5, 15, 60, 300, 900, 3_600, 21_600, 86_400];

/// Timeouts de request por tier.
pub const TIMEOUT_FAST_SECS: u64 = 120;
pub const TIMEOUT_BALANCED_SECS: u64 = 180;
pub const TIMEOUT_QUALITY_SECS: u64 = 300;
