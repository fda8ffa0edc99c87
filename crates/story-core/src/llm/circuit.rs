//! Circuit breaker por (provider, model).
//!
//! Máquina de estados clásica: `Closed` acumula fallas consecutivas; al
//! llegar al umbral pasa a `Open` por una ventana fija; vencida la ventana
//! un único probe (`HalfOpen`) decide si cierra o re-abre. El estado es
//! in-process; los métodos reciben `now` para que los tests sean
//! deterministas.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::constants::{CIRCUIT_FAILURE_THRESHOLD, CIRCUIT_OPEN_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Decisión de admisión para un request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitDecision {
    Allow,
    /// Ventana vencida: se admite un único probe.
    AllowProbe,
    Reject { open_until: DateTime<Utc> },
}

/// Transición observable, para que el caller emita el evento que corresponda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    Opened { open_until: DateTime<Utc> },
    Closed,
}

#[derive(Debug, Clone)]
struct CircuitEntry {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    open_until: Option<DateTime<Utc>>,
}

impl Default for CircuitEntry {
    fn default() -> Self {
        Self { state: CircuitState::Closed,
               consecutive_failures: 0,
               last_failure: None,
               open_until: None }
    }
}

#[derive(Debug)]
pub struct CircuitRegistry {
    entries: DashMap<(String, String), CircuitEntry>,
    threshold: u32,
    open_window: ChronoDuration,
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new(CIRCUIT_FAILURE_THRESHOLD, CIRCUIT_OPEN_SECS)
    }
}

impl CircuitRegistry {
    pub fn new(threshold: u32, open_window_secs: u64) -> Self {
        Self { entries: DashMap::new(),
               threshold,
               open_window: ChronoDuration::seconds(open_window_secs as i64) }
    }

    fn key(provider: &str, model: &str) -> (String, String) {
        (provider.to_string(), model.to_string())
    }

    /// Estado actual (para inspección y tests).
    pub fn state(&self, provider: &str, model: &str) -> CircuitState {
        self.entries
            .get(&Self::key(provider, model))
            .map(|e| e.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// ¿Se admite un request ahora? Puede transicionar Open → HalfOpen.
    pub fn admit(&self, provider: &str, model: &str, now: DateTime<Utc>) -> CircuitDecision {
        let mut entry = self.entries.entry(Self::key(provider, model)).or_default();
        match entry.state {
            CircuitState::Closed => CircuitDecision::Allow,
            CircuitState::HalfOpen => CircuitDecision::AllowProbe,
            CircuitState::Open => {
                let open_until = entry.open_until.unwrap_or(now);
                if now >= open_until {
                    entry.state = CircuitState::HalfOpen;
                    CircuitDecision::AllowProbe
                } else {
                    CircuitDecision::Reject { open_until }
                }
            }
        }
    }

    /// Registra un éxito. Cierra el circuito si estaba en probe.
    pub fn on_success(&self, provider: &str, model: &str) -> Option<CircuitTransition> {
        let mut entry = self.entries.entry(Self::key(provider, model)).or_default();
        let was = entry.state;
        entry.state = CircuitState::Closed;
        entry.consecutive_failures = 0;
        entry.open_until = None;
        match was {
            CircuitState::Closed => None,
            _ => Some(CircuitTransition::Closed),
        }
    }

    /// Registra una falla. Abre el circuito al llegar al umbral o si falla el
    /// probe de half-open.
    pub fn on_failure(&self, provider: &str, model: &str, now: DateTime<Utc>) -> Option<CircuitTransition> {
        let mut entry = self.entries.entry(Self::key(provider, model)).or_default();
        entry.last_failure = Some(now);
        match entry.state {
            CircuitState::HalfOpen => {
                let open_until = now + self.open_window;
                entry.state = CircuitState::Open;
                entry.open_until = Some(open_until);
                Some(CircuitTransition::Opened { open_until })
            }
            CircuitState::Open => None,
            CircuitState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.threshold {
                    let open_until = now + self.open_window;
                    entry.state = CircuitState::Open;
                    entry.open_until = Some(open_until);
                    Some(CircuitTransition::Opened { open_until })
                } else {
                    None
                }
            }
        }
    }
}
