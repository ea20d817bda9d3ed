//! Periodic tick schedule for the playback driver.

use std::time::{Duration, Instant};

/// Repeating deadline armed while playing.
///
/// Polling fires at most once per call: when the host falls behind by
/// several intervals they collapse into a single tick.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl FrameTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm with a new interval; the first tick is due one interval from `now`.
    pub fn arm(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.next_due = Some(now + interval);
    }

    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Next deadline, if armed.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns true if a tick is due, and schedules the next one after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }

        let mut next = due + self.interval;
        if next <= now {
            // Skip the intervals we missed.
            let behind = now.duration_since(due).as_nanos();
            let step = self.interval.as_nanos().max(1);
            let skipped = (behind / step + 1).min(u32::MAX as u128) as u32;
            next = due + self.interval * skipped;
            if next <= now {
                next = now + self.interval;
            }
        }
        self.next_due = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_disarmed_never_fires() {
        let mut timer = FrameTimer::new(10 * MS);
        assert!(!timer.is_armed());
        assert!(!timer.poll(Instant::now() + 100 * MS));
    }

    #[test]
    fn test_fires_on_interval() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(Duration::ZERO);
        timer.arm(10 * MS, start);

        assert!(!timer.poll(start + 5 * MS));
        assert!(timer.poll(start + 10 * MS));
        assert!(!timer.poll(start + 15 * MS));
        assert!(timer.poll(start + 20 * MS));
        assert_eq!(timer.next_due(), Some(start + 30 * MS));
    }

    #[test]
    fn test_missed_intervals_batch() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(10 * MS);
        timer.arm(10 * MS, start);

        assert!(timer.poll(start + 55 * MS));
        assert!(!timer.poll(start + 56 * MS));
        assert_eq!(timer.next_due(), Some(start + 60 * MS));
    }

    #[test]
    fn test_disarm() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(10 * MS);
        timer.arm(10 * MS, start);
        timer.disarm();
        assert!(!timer.poll(start + 50 * MS));
    }
}
