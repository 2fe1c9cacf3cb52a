//! Keypad digit accumulator.

use karaoke_proto::catalog::{SongId, MAX_SONG_DIGITS};
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::timer::Timer;

/// Typed digits are discarded after this long without a keystroke.
pub const INPUT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct InputBuffer {
    digits: String,
    expiry: Timer,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `c` if it is a digit and the buffer has room.  Each accepted
    /// digit restarts the inactivity timer.
    pub fn push_digit(&mut self, c: char, now: Instant) -> bool {
        if !c.is_ascii_digit() || self.digits.len() >= MAX_SONG_DIGITS {
            return false;
        }
        self.digits.push(c);
        self.expiry.arm(now, INPUT_TIMEOUT);
        true
    }

    /// Take the typed number.  `None` when nothing was typed.
    pub fn commit(&mut self) -> Option<SongId> {
        if self.digits.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.digits);
        self.expiry.cancel();
        // only digits ever get in, and at most MAX_SONG_DIGITS of them
        SongId::parse(&raw).ok()
    }

    pub fn clear(&mut self) {
        self.digits.clear();
        self.expiry.cancel();
    }

    /// Fire the inactivity timer.  Returns true when typed digits were dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        if !self.expiry.fire(now) {
            return false;
        }
        debug!("input: '{}' expired", self.digits);
        let had_digits = !self.digits.is_empty();
        self.digits.clear();
        had_digits
    }

    pub fn text(&self) -> &str {
        &self.digits
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.expiry.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_to_five_digits() {
        let now = Instant::now();
        let mut input = InputBuffer::new();
        for c in "123456".chars() {
            input.push_digit(c, now);
        }
        assert_eq!(input.text(), "12345");
        assert!(!input.push_digit('9', now));
        assert!(!input.push_digit('x', now));
    }

    #[test]
    fn test_commit_takes_and_clears() {
        let now = Instant::now();
        let mut input = InputBuffer::new();
        assert_eq!(input.commit(), None);

        for c in "500".chars() {
            input.push_digit(c, now);
        }
        assert_eq!(input.commit().map(|id| id.to_string()), Some("500".to_string()));
        assert!(input.is_empty());
        assert_eq!(input.deadline(), None);
    }

    #[test]
    fn test_each_digit_restarts_timeout() {
        let t0 = Instant::now();
        let mut input = InputBuffer::new();
        input.push_digit('7', t0);
        input.push_digit('5', t0 + Duration::from_secs(2));

        assert!(!input.expire(t0 + Duration::from_secs(4)));
        assert_eq!(input.text(), "75");
        assert!(input.expire(t0 + Duration::from_secs(5)));
        assert!(input.is_empty());
    }

    #[test]
    fn test_clear_cancels_timeout() {
        let t0 = Instant::now();
        let mut input = InputBuffer::new();
        input.push_digit('4', t0);
        input.clear();
        assert!(input.is_empty());
        assert_eq!(input.deadline(), None);
        assert!(!input.expire(t0 + INPUT_TIMEOUT));
    }

    #[test]
    fn test_rejected_digit_does_not_extend_timeout() {
        let t0 = Instant::now();
        let mut input = InputBuffer::new();
        for c in "12345".chars() {
            input.push_digit(c, t0);
        }
        input.push_digit('6', t0 + Duration::from_secs(2));
        assert!(input.expire(t0 + INPUT_TIMEOUT));
    }
}
