//! NotificationArbiter: decides what the reservation panel shows.
//!
//! One banner slot (validation message or upcoming-song hint) plus a guard
//! window that keeps hints away for a while after a message.  The visible
//! `Notification` is never stored: `current()` derives it by priority:
//!
//! 1. validation message
//! 2. typed digits, while the input buffer is non-empty
//! 3. upcoming-song hint
//! 4. the queue listing (`Notification::Idle`)

use karaoke_proto::protocol::{Notification, ValidationKind};
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::timer::{earliest, Interval, Timer};

pub const VALIDATION_DURATION: Duration = Duration::from_millis(5000);
pub const ERROR_MIN_DURATION: Duration = Duration::from_millis(6000);
/// Extra hint suppression after a validation message clears.
pub const GUARD_AFTER_MESSAGE: Duration = Duration::from_secs(15);
/// Hint suppression after typed digits time out unused.
pub const GUARD_AFTER_TYPING: Duration = Duration::from_secs(30);
pub const HINT_DURATION: Duration = Duration::from_secs(8);
pub const HINT_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
enum Banner {
    None,
    Validation { text: String, kind: ValidationKind },
    Hint { title: String },
}

#[derive(Debug)]
pub struct NotificationArbiter {
    banner: Banner,
    banner_expiry: Timer,
    guard: Timer,
    hint_cadence: Interval,
}

impl Default for NotificationArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationArbiter {
    pub fn new() -> Self {
        Self {
            banner: Banner::None,
            banner_expiry: Timer::default(),
            guard: Timer::default(),
            hint_cadence: Interval::new(HINT_PERIOD),
        }
    }

    /// Show a message for `duration` (errors stay at least 6 s).  Replaces
    /// any hint, and keeps hints away until 15 s after the message clears.
    pub fn show_validation(
        &mut self,
        text: impl Into<String>,
        kind: ValidationKind,
        duration: Duration,
        now: Instant,
    ) {
        let duration = match kind {
            ValidationKind::Error => duration.max(ERROR_MIN_DURATION),
            ValidationKind::Success => duration,
        };
        let text = text.into();
        debug!("notice: {:?} '{}' for {:?}", kind, text, duration);
        self.banner = Banner::Validation { text, kind };
        self.banner_expiry.arm(now, duration);
        self.guard.arm(now, duration + GUARD_AFTER_MESSAGE);
    }

    pub fn success(&mut self, text: impl Into<String>, now: Instant) {
        self.show_validation(text, ValidationKind::Success, VALIDATION_DURATION, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        self.show_validation(text, ValidationKind::Error, VALIDATION_DURATION, now);
    }

    /// A digit was typed: the operator takes the panel back immediately.
    pub fn digit_accepted(&mut self) {
        match self.banner {
            Banner::Validation { .. } => {
                self.banner_expiry.cancel();
                self.guard.cancel();
            }
            Banner::Hint { .. } => self.banner_expiry.cancel(),
            Banner::None => {}
        }
        self.banner = Banner::None;
    }

    /// Typed digits timed out without Enter.
    pub fn typing_expired(&mut self, now: Instant) {
        self.guard.arm(now, GUARD_AFTER_TYPING);
    }

    /// Whether a hint probe may be issued right now.
    pub fn may_request_hint(&self, typing: bool) -> bool {
        !typing && !self.is_guarded() && !self.is_showing_validation()
    }

    /// Show `Coming Next: <title>` if nothing outranks it by now.
    pub fn show_hint(&mut self, title: &str, typing: bool, now: Instant) -> bool {
        if !self.hint_cadence.is_running() || !self.may_request_hint(typing) {
            debug!("notice: hint for '{}' dropped", title);
            return false;
        }
        self.banner = Banner::Hint {
            title: format!("Coming Next: {}", title),
        };
        self.banner_expiry.arm(now, HINT_DURATION);
        true
    }

    /// Track the (queue non-empty AND session active) condition.  Returns
    /// true when the cadence just started, meaning a hint is due right away.
    pub fn set_hint_cadence(&mut self, active: bool, now: Instant) -> bool {
        match (active, self.hint_cadence.is_running()) {
            (true, false) => {
                self.hint_cadence.start(now);
                true
            }
            (false, true) => {
                self.hint_cadence.stop();
                if self.is_showing_hint() {
                    self.banner = Banner::None;
                    self.banner_expiry.cancel();
                }
                false
            }
            _ => false,
        }
    }

    /// Fire due timers.  Returns true when the hint cadence ticked.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.banner_expiry.fire(now) {
            self.banner = Banner::None;
        }
        self.guard.fire(now);
        self.hint_cadence.fire(now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        earliest([
            self.banner_expiry.deadline(),
            self.guard.deadline(),
            self.hint_cadence.deadline(),
        ])
    }

    pub fn is_showing_validation(&self) -> bool {
        matches!(self.banner, Banner::Validation { .. })
    }

    pub fn is_showing_hint(&self) -> bool {
        matches!(self.banner, Banner::Hint { .. })
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_armed()
    }

    pub fn current(&self, typed: &str) -> Notification {
        match &self.banner {
            Banner::Validation { text, kind } => Notification::ValidationMessage {
                text: text.clone(),
                kind: *kind,
            },
            _ if !typed.is_empty() => Notification::TypedDigits {
                text: typed.to_string(),
            },
            Banner::Hint { title } => Notification::UpcomingSongHint {
                title: title.clone(),
            },
            Banner::None => Notification::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_error_held_at_least_six_seconds() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.show_validation("Song 9 not found", ValidationKind::Error, secs(1), t0);

        arb.tick(t0 + Duration::from_millis(5999));
        assert!(arb.is_showing_validation());
        arb.tick(t0 + secs(6));
        assert!(!arb.is_showing_validation());
        assert_eq!(arb.current(""), Notification::Idle);
    }

    #[test]
    fn test_success_uses_requested_duration() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.show_validation("Playing song 4 now", ValidationKind::Success, secs(3), t0);
        arb.tick(t0 + secs(3));
        assert!(!arb.is_showing_validation());
    }

    #[test]
    fn test_guard_outlives_message_by_fifteen_seconds() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.set_hint_cadence(true, t0);
        arb.success("Song 75 added to reserved list", t0);

        arb.tick(t0 + secs(5));
        assert!(!arb.is_showing_validation());
        assert!(!arb.may_request_hint(false));

        arb.tick(t0 + secs(19));
        assert!(arb.is_guarded());
        arb.tick(t0 + secs(20));
        assert!(arb.may_request_hint(false));
    }

    #[test]
    fn test_digit_cancels_message_and_guard() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.error("Could not find song 12", t0);
        arb.digit_accepted();
        assert!(!arb.is_showing_validation());
        assert!(!arb.is_guarded());
        assert_eq!(
            arb.current("4"),
            Notification::TypedDigits {
                text: "4".to_string()
            }
        );
    }

    #[test]
    fn test_typed_digits_outrank_hint_and_stale_guard() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.set_hint_cadence(true, t0);
        assert!(arb.show_hint("My Way", false, t0));
        arb.typing_expired(t0);

        assert_eq!(
            arb.current("12"),
            Notification::TypedDigits {
                text: "12".to_string()
            }
        );
        assert_eq!(
            arb.current(""),
            Notification::UpcomingSongHint {
                title: "Coming Next: My Way".to_string()
            }
        );
    }

    #[test]
    fn test_validation_outranks_typing() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.success("Song 8 added to reserved list", t0);
        assert!(matches!(
            arb.current("9"),
            Notification::ValidationMessage { .. }
        ));
    }

    #[test]
    fn test_hint_suppressed_while_typing_or_guarded() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.set_hint_cadence(true, t0);
        assert!(!arb.may_request_hint(true));
        assert!(!arb.show_hint("X", true, t0));

        arb.typing_expired(t0);
        assert!(!arb.show_hint("X", false, t0 + secs(29)));
        arb.tick(t0 + secs(30));
        assert!(arb.show_hint("X", false, t0 + secs(30)));
    }

    #[test]
    fn test_hint_expires_after_eight_seconds() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.set_hint_cadence(true, t0);
        arb.show_hint("Song #101", false, t0);
        arb.tick(t0 + Duration::from_millis(7999));
        assert!(arb.is_showing_hint());
        arb.tick(t0 + secs(8));
        assert!(!arb.is_showing_hint());
    }

    #[test]
    fn test_validation_replaces_hint() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        arb.set_hint_cadence(true, t0);
        arb.show_hint("Song #101", false, t0);
        arb.error("Song 5 not found", t0 + secs(1));
        assert!(!arb.is_showing_hint());
        // the hint's 8 s expiry no longer applies to the message
        arb.tick(t0 + secs(6));
        assert!(arb.is_showing_validation());
    }

    #[test]
    fn test_cadence_start_and_teardown() {
        let t0 = Instant::now();
        let mut arb = NotificationArbiter::new();
        assert!(arb.set_hint_cadence(true, t0));
        assert!(!arb.set_hint_cadence(true, t0 + secs(1)));

        assert!(!arb.tick(t0 + secs(29)));
        assert!(arb.tick(t0 + secs(30)));

        arb.show_hint("Song #1", false, t0 + secs(30));
        assert!(!arb.set_hint_cadence(false, t0 + secs(31)));
        assert!(!arb.is_showing_hint());
        assert!(!arb.tick(t0 + secs(60)));
        assert!(!arb.show_hint("Song #1", false, t0 + secs(61)));
    }
}
