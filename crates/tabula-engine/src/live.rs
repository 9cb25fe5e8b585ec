//! Live Update Merge guard.
//!
//! Push events can arrive out of order or describe changes that an
//! already-completed full reload has picked up. An event is applied only if
//! it is newer than the last applied event AND newer than the last full
//! refresh.

use tabula_core::LiveEvent;

/// Ordering guard for push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveUpdateGuard {
    last_applied: i64,
    last_refresh_ms: i64,
}

impl Default for LiveUpdateGuard {
    fn default() -> Self {
        Self {
            last_applied: -1,
            last_refresh_ms: -1,
        }
    }
}

impl LiveUpdateGuard {
    pub fn last_applied(&self) -> i64 {
        self.last_applied
    }

    /// Record a completed full reload.
    pub fn mark_refreshed(&mut self, now_ms: i64) {
        self.last_refresh_ms = now_ms;
    }

    /// Whether the event passes both checks. Does not record it.
    pub fn admits(&self, event: &LiveEvent) -> bool {
        event.sequence_id > self.last_applied && event.timestamp_ms > self.last_refresh_ms
    }

    /// Admit the event and record its sequence id, or reject it.
    pub fn accept(&mut self, event: &LiveEvent) -> bool {
        if !self.admits(event) {
            tracing::debug!(
                "Ignoring live event {} for '{}' (last applied {}, refreshed at {})",
                event.sequence_id,
                event.record_id,
                self.last_applied,
                self.last_refresh_ms
            );
            return false;
        }
        self.last_applied = event.sequence_id;
        true
    }
}
