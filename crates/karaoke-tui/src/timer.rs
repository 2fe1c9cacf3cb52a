//! Deadline-based one-shot timers and fixed-rate intervals.
//!
//! Every timer is a plain field of the component that arms it.  Nothing here
//! sleeps: the core loop asks the state machine for its earliest deadline,
//! sleeps until then, and calls `tick(now)`, which fires whatever is due.

use tokio::time::{Duration, Instant};

#[derive(Debug, Default, Clone)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// (Re)arm to fire `after` from `now`, replacing any previous deadline.
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true (once) when the deadline has passed; the timer disarms itself.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Repeating timer.  Stopped until `start`.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Fires at most once per call.  Missed periods are skipped rather than
    /// replayed in a burst.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next {
            Some(d) if d <= now => {
                let mut next = d + self.period;
                while next <= now {
                    next += self.period;
                }
                self.next = Some(next);
                true
            }
            _ => false,
        }
    }
}

/// Earliest of a set of optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_once() {
        let t0 = Instant::now();
        let mut timer = Timer::default();
        assert!(!timer.fire(t0));

        timer.arm(t0, Duration::from_secs(3));
        assert!(!timer.fire(t0 + Duration::from_millis(2999)));
        assert!(timer.fire(t0 + Duration::from_secs(3)));
        assert!(!timer.is_armed());
        assert!(!timer.fire(t0 + Duration::from_secs(4)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let t0 = Instant::now();
        let mut timer = Timer::default();
        timer.arm(t0, Duration::from_secs(3));
        timer.arm(t0 + Duration::from_secs(2), Duration::from_secs(3));
        assert!(!timer.fire(t0 + Duration::from_secs(4)));
        assert!(timer.fire(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_interval_skips_missed_periods() {
        let t0 = Instant::now();
        let mut every = Interval::new(Duration::from_secs(30));
        assert!(!every.fire(t0 + Duration::from_secs(60)));

        every.start(t0);
        assert!(every.fire(t0 + Duration::from_secs(95)));
        assert_eq!(every.deadline(), Some(t0 + Duration::from_secs(120)));
        assert!(!every.fire(t0 + Duration::from_secs(100)));

        every.stop();
        assert!(!every.is_running());
    }

    #[test]
    fn test_earliest() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(1);
        assert_eq!(earliest([None, Some(later), Some(t0)]), Some(t0));
        assert_eq!(earliest([None, None]), None);
    }
}
