//! Cooldown por (project, step) tras fallas terminales de un paso.
//!
//! La racha de fallas avanza por una agenda fija (5s → 24h). Un paso cuyo
//! `next_allowed` está en el futuro se rechaza con `Cooldown` sin tocar la
//! red. El éxito limpia la entrada.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::COOLDOWN_SCHEDULE_SECS;
use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub streak: u32,
    pub next_allowed: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CooldownTracker {
    entries: DashMap<(Uuid, usize), CooldownEntry>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rechaza con `Cooldown` si el paso todavía no puede reintentarse.
    pub fn check(&self, project_id: Uuid, step: usize, now: DateTime<Utc>) -> Result<(), EngineError> {
        if let Some(entry) = self.entries.get(&(project_id, step)) {
            if now < entry.next_allowed {
                return Err(EngineError::Cooldown { step,
                                                   until: entry.next_allowed });
            }
        }
        Ok(())
    }

    /// Avanza la racha y devuelve la entrada resultante.
    pub fn record_failure(&self, project_id: Uuid, step: usize, now: DateTime<Utc>) -> CooldownEntry {
        let mut slot = self.entries.entry((project_id, step)).or_insert(CooldownEntry { streak: 0,
                                                                                        next_allowed: now });
        let idx = (slot.streak as usize).min(COOLDOWN_SCHEDULE_SECS.len() - 1);
        let wait = ChronoDuration::seconds(COOLDOWN_SCHEDULE_SECS[idx] as i64);
        slot.streak += 1;
        slot.next_allowed = now + wait;
        *slot
    }

    /// Limpia la racha tras un paso exitoso.
    pub fn clear(&self, project_id: Uuid, step: usize) {
        self.entries.remove(&(project_id, step));
    }
}
