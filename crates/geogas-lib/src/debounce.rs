//! Change debouncing
//!
//! Viewport events arrive in bursts while the user pans or zooms. The
//! debouncer keeps a single pending slot: every new event replaces the
//! previous one and pushes the deadline back, so only the last event of a
//! burst fires. The clock is supplied by the caller, which keeps this type
//! independent of any runtime.

use std::time::{Duration, Instant};

/// Quiescence delay before a pending change fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Single-slot trailing-edge debouncer
#[derive(Debug, Clone)]
pub struct ChangeDebouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Default for ChangeDebouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T> ChangeDebouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload` to fire `delay` after `now`
    ///
    /// Returns the payload it superseded, if any.
    pub fn schedule(&mut self, payload: T, now: Instant) -> Option<T> {
        self.pending
            .replace((now + self.delay, payload))
            .map(|(_, stale)| stale)
    }

    /// Take the pending payload if its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, payload)| payload),
            _ => None,
        }
    }

    /// Deadline of the pending payload
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending payload without firing it
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_delay() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::default();
        debouncer.schedule("a", start);

        assert_eq!(debouncer.poll(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), Some("a"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_burst_fires_last_only() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::new(Duration::from_millis(300));

        assert_eq!(debouncer.schedule(1, start), None);
        assert_eq!(debouncer.schedule(2, start + Duration::from_millis(100)), Some(1));
        assert_eq!(debouncer.schedule(3, start + Duration::from_millis(200)), Some(2));

        // The first deadline has passed but was superseded
        assert_eq!(debouncer.poll(start + Duration::from_millis(400)), None);
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(500))
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), Some(3));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = ChangeDebouncer::default();
        debouncer.schedule('x', start);
        assert_eq!(debouncer.cancel(), Some('x'));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(start + Duration::from_secs(10)), None);
    }
}
