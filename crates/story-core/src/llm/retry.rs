//! Backoff exponencial con jitter.

use std::time::Duration;

use crate::constants::BACKOFF_CAP_SECS;

/// `base · 2^attempt · (1 + jitter)`, con tope de 60s por intento.
///
/// `attempt` es 0-based (primer reintento = 0). `jitter` debe estar en
/// `[0, 0.1)`; el caller lo muestrea para que esta función quede pura.
pub fn backoff_delay(base: Duration, attempt: u32, jitter: f64) -> Duration {
    let factor = 2f64.powi(attempt.min(16) as i32);
    let secs = base.as_secs_f64() * factor * (1.0 + jitter);
    Duration::from_secs_f64(secs.min(BACKOFF_CAP_SECS as f64))
}
