use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Minimum time between two accepted checks for the same lesson
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);

/// A lesson idle for this many intervals is dropped from the gate
pub const IDLE_INTERVALS: u32 = 10;

/// Per-lesson debounce for live verification
///
/// The check and the update happen under one lock, so a burst of concurrent
/// calls for the same lesson lets exactly one through. Rejected attempts leave
/// the stored time untouched. State lives for the process lifetime only.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_accepted: Mutex<HashMap<String, Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Age after which a lesson's entry no longer affects any decision worth keeping
    pub fn idle_after(&self) -> Duration {
        self.min_interval * IDLE_INTERVALS
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.last_accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accepts the attempt at `now` and records it, or rejects it without changes
    pub fn try_acquire(&self, lesson_id: &str, now: Instant) -> bool {
        let mut entries = self.entries();
        if let Some(last) = entries.get(lesson_id) {
            if now.saturating_duration_since(*last) < self.min_interval {
                return false;
            }
        }
        entries.insert(lesson_id.to_string(), now);
        true
    }

    /// Time of the last accepted check for `lesson_id`
    pub fn last_accepted(&self, lesson_id: &str) -> Option<Instant> {
        self.entries().get(lesson_id).copied()
    }

    pub fn reset(&self, lesson_id: &str) {
        self.entries().remove(lesson_id);
    }

    /// Drops lessons whose last accepted check is older than `age`; returns how many
    pub fn forget_older_than(&self, age: Duration, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, last| now.saturating_duration_since(*last) < age);
        before - entries.len()
    }

    pub fn tracked_lessons(&self) -> usize {
        self.entries().len()
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
