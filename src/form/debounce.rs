//! Explicit, cancellable debounce timer driven by caller-supplied instants.

use std::time::{Duration, Instant};

/// Holds the latest scheduled value until it has been quiet for `delay`
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending value and restart the quiet period from `now`
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.delay, value));
    }

    /// Drop the pending value, returning it
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    /// Take the pending value if its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((due, _)) if now >= *due => self.cancel(),
            _ => None,
        }
    }

    /// Take the pending value regardless of its deadline
    pub fn flush(&mut self) -> Option<T> {
        self.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value becomes due
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(due, _)| *due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(300);

    #[test]
    fn test_fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule("a", start);

        assert_eq!(debouncer.poll(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.poll(start + DELAY), Some("a"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + DELAY * 2), None);
    }

    #[test]
    fn test_reschedule_resets_timer_and_keeps_latest() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule(1, start);
        debouncer.schedule(2, start + Duration::from_millis(200));

        assert_eq!(debouncer.poll(start + DELAY), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), Some(2));
    }

    #[test]
    fn test_flush_and_cancel_are_exclusive() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);

        debouncer.schedule("x", start);
        assert_eq!(debouncer.flush(), Some("x"));
        assert_eq!(debouncer.cancel(), None);

        debouncer.schedule("y", start);
        assert_eq!(debouncer.deadline(), Some(start + DELAY));
        assert_eq!(debouncer.cancel(), Some("y"));
        assert_eq!(debouncer.flush(), None);
    }
}
