//! Version stamps derived from the wall clock
//!
//! Stamps are milliseconds since the Unix epoch, forced strictly above the
//! last stamp handed out by the same clock. Two calls on one clock never
//! return the same value, and a later call never returns a smaller one.

use crate::types::Version;
use std::sync::atomic::{AtomicI64, Ordering};

/// Issues monotonically increasing version stamps
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicI64,
}

impl VersionClock {
    /// Creates a clock that has not issued any stamp yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock whose next stamp is strictly greater than `floor`
    pub fn starting_after(floor: Version) -> Self {
        Self {
            last: AtomicI64::new(floor.as_i64()),
        }
    }

    /// Returns a fresh stamp
    ///
    /// Never blocks and never fails. If the wall clock reads before the epoch
    /// or steps backwards, the stamp is the previous one plus one.
    pub fn next(&self) -> Version {
        let now = wall_clock_millis();
        let stamp = |last: i64| now.max(last.saturating_add(1));

        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(stamp(last)))
            .unwrap_or_else(|last| last);

        Version::from_raw(stamp(previous))
    }

    /// Returns the most recently issued stamp, or the starting floor
    pub fn last_issued(&self) -> Version {
        Version::from_raw(self.last.load(Ordering::Acquire))
    }
}

fn wall_clock_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_stamps_track_wall_clock() {
        let clock = VersionClock::new();
        let before = wall_clock_millis();
        let stamp = clock.next();
        assert!(stamp.as_i64() >= before);
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let clock = VersionClock::new();
        let mut previous = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(clock.last_issued(), previous);
    }

    #[test]
    fn test_starting_after_floor_in_the_future() {
        let floor = Version::from_raw(wall_clock_millis() + 60_000);
        let clock = VersionClock::starting_after(floor);

        assert_eq!(clock.next(), floor.successor());
        assert_eq!(clock.next(), floor.successor().successor());
    }

    #[test]
    fn test_unique_across_threads() {
        let clock = Arc::new(VersionClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..500).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for stamp in handle.join().unwrap() {
                assert!(seen.insert(stamp), "duplicate stamp {}", stamp);
            }
        }
        assert_eq!(seen.len(), 2000);
    }
}
