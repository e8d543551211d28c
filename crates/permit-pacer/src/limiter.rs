//! Keyed token-spacing primitive underlying the Local Pacer (SPEC §4.6).
//!
//! Each key gets its own `next_at` schedule: the first acquire for a key is
//! granted immediately, and every subsequent acquire for the same key is
//! pushed back by `ceil(1000/rps)` from the last scheduled slot, however
//! long that slot's wait actually took. This is spacing, not bucket
//! refilling — it cannot burst, unlike the fixed-window style the same
//! primitive used to implement for a single global key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

fn interval_for_rps(rps: u32) -> Duration {
    let rps = rps.max(1) as u64;
    Duration::from_millis((1000 + rps - 1) / rps)
}

struct KeyState {
    next_at: Instant,
    last_used: Instant,
}

/// A registry of independent token-spacing schedules, one per key.
///
/// Acquiring the same key twice in a row always orders the second acquire
/// after the first (FIFO per key); acquiring distinct keys never waits on
/// each other.
pub(crate) struct KeyedSpacer<K> {
    interval: Duration,
    keys: Mutex<HashMap<K, KeyState>>,
}

impl<K: Eq + Hash + Clone> KeyedSpacer<K> {
    pub(crate) fn new(rps: u32) -> Self {
        Self {
            interval: interval_for_rps(rps),
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves the next slot for `key` and returns when it is scheduled
    /// (never in the past). Does not sleep; callers await the returned
    /// instant themselves so multiple spacers can be chained without
    /// holding any lock across an `.await`.
    pub(crate) fn reserve(&self, key: &K, now: Instant) -> Instant {
        let mut keys = self.keys.lock().unwrap();
        let scheduled = match keys.get(key) {
            Some(state) => now.max(state.next_at),
            None => now,
        };
        let next_at = scheduled + self.interval;
        match keys.get_mut(key) {
            Some(state) => {
                state.next_at = next_at;
                state.last_used = now;
            }
            None => {
                keys.insert(
                    key.clone(),
                    KeyState {
                        next_at,
                        last_used: now,
                    },
                );
            }
        }
        scheduled
    }

    /// Removes keys whose last reservation is older than `stale_after`.
    /// Returns the number of keys evicted.
    pub(crate) fn evict_stale(&self, now: Instant, stale_after: Duration) -> usize {
        let mut keys = self.keys.lock().unwrap();
        let before = keys.len();
        keys.retain(|_, state| now.duration_since(state.last_used) < stale_after);
        before - keys.len()
    }

    #[cfg(test)]
    pub(crate) fn key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_rounds_up() {
        assert_eq!(interval_for_rps(45), Duration::from_millis(23));
        assert_eq!(interval_for_rps(50), Duration::from_millis(20));
        assert_eq!(interval_for_rps(1000), Duration::from_millis(1));
    }

    #[test]
    fn first_reservation_for_a_key_is_immediate() {
        let spacer: KeyedSpacer<&str> = KeyedSpacer::new(50);
        let now = Instant::now();
        assert_eq!(spacer.reserve(&"a", now), now);
    }

    #[test]
    fn second_reservation_is_spaced_from_the_first() {
        let spacer: KeyedSpacer<&str> = KeyedSpacer::new(50);
        let now = Instant::now();
        let first = spacer.reserve(&"a", now);
        let second = spacer.reserve(&"a", now);
        assert_eq!(second, first + Duration::from_millis(20));
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let spacer: KeyedSpacer<&str> = KeyedSpacer::new(1);
        let now = Instant::now();
        assert_eq!(spacer.reserve(&"a", now), now);
        assert_eq!(spacer.reserve(&"b", now), now);
    }

    #[test]
    fn evict_stale_removes_only_old_keys() {
        let spacer: KeyedSpacer<&str> = KeyedSpacer::new(50);
        let now = Instant::now();
        spacer.reserve(&"a", now);
        assert_eq!(spacer.key_count(), 1);

        let evicted = spacer.evict_stale(now + Duration::from_secs(120), Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert_eq!(spacer.key_count(), 0);
    }
}
