use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Last approval seen for one symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownSlot {
    pub last_approval: Option<DateTime<Utc>>,
}

impl CooldownSlot {
    /// True when `now` falls inside `window` after the last approval.
    /// Snapshots stamped before the last approval are inside the window.
    pub fn blocks(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_approval {
            Some(last) => now.signed_duration_since(last) < window,
            None => false,
        }
    }

    pub fn record(&mut self, approved_at: DateTime<Utc>) {
        self.last_approval = Some(approved_at);
    }

    /// Time left in the window, zero when clear
    pub fn remaining(&self, now: DateTime<Utc>, window: Duration) -> Duration {
        match self.last_approval {
            Some(last) => (window - now.signed_duration_since(last)).max(Duration::zero()),
            None => Duration::zero(),
        }
    }
}

/// Per-symbol cooldown state. Each symbol owns its own lock, so holding
/// one symbol's slot never blocks evaluation of another.
#[derive(Default)]
pub struct CooldownBook {
    /// Symbol -> cooldown slot
    slots: DashMap<String, Arc<Mutex<CooldownSlot>>>,
}

impl CooldownBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `symbol`, created on first use
    pub fn slot(&self, symbol: &str) -> Arc<Mutex<CooldownSlot>> {
        if let Some(existing) = self.slots.get(symbol) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.slots
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CooldownSlot::default())))
                .value(),
        )
    }

    pub fn last_approval(&self, symbol: &str) -> Option<DateTime<Utc>> {
        let slot = self.slots.get(symbol)?;
        let last = lock(slot.value()).last_approval;
        last
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub(crate) fn lock(slot: &Mutex<CooldownSlot>) -> MutexGuard<'_, CooldownSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_boundaries() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let window = Duration::seconds(3);
        let mut slot = CooldownSlot::default();
        assert!(!slot.blocks(t0, window));

        slot.record(t0);
        assert!(slot.blocks(t0 + Duration::seconds(2), window));
        assert!(slot.blocks(t0 - Duration::seconds(1), window));
        assert!(!slot.blocks(t0 + Duration::seconds(3), window));
        assert_eq!(slot.remaining(t0 + Duration::seconds(1), window), Duration::seconds(2));
        assert_eq!(slot.remaining(t0 + Duration::seconds(9), window), Duration::zero());
    }

    #[test]
    fn test_slots_are_per_symbol() {
        let book = CooldownBook::new();
        let t0 = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();

        lock(&book.slot("NIFTY")).record(t0);
        assert_eq!(book.last_approval("NIFTY"), Some(t0));
        assert_eq!(book.last_approval("BANKNIFTY"), None);

        // Same Arc handed out on every call
        assert!(Arc::ptr_eq(&book.slot("NIFTY"), &book.slot("NIFTY")));
        assert_eq!(book.len(), 1);
    }
}
