//! Timestamp, event-id and clock helpers.

use std::cell::Cell;
use ulid::Ulid;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Source of `checked_at` / span timestamps.
pub trait Clock {
    fn now(&self) -> String;
}

/// Wall clock in the `now_epoch_z` format.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        now_epoch_z()
    }
}

/// Monotonic tick counter rendered in the epoch-`Z` format, starting at `0Z`.
///
/// Used wherever output must be byte-stable across runs.
#[derive(Debug, Default)]
pub struct LogicalClock {
    tick: Cell<u64>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> String {
        let t = self.tick.get();
        self.tick.set(t + 1);
        format!("{}Z", t)
    }
}
