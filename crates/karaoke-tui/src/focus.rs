//! ControlFocusNavigator: keyboard focus over the four transport buttons.
//!
//! The ring hides itself 5 s after it was last shown.  Arrow navigation
//! switches on navigation mode, which keeps the ring up until 10 s after the
//! last arrow press; activating a button drops back to a quick 3 s hide.

use karaoke_proto::protocol::{FocusState, TransportAction};
use tokio::time::{Duration, Instant};

use crate::timer::{earliest, Timer};

pub const AUTO_HIDE: Duration = Duration::from_secs(5);
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const HIDE_AFTER_ACTIVATE: Duration = Duration::from_secs(3);

/// Focus index used when arrow navigation starts on a hidden ring (play/pause).
const ENTRY_INDEX: usize = 1;

#[derive(Debug, Default)]
pub struct ControlFocusNavigator {
    visible: bool,
    index: Option<usize>,
    navigation_mode: bool,
    hide: Timer,
    navigation_exit: Timer,
}

impl ControlFocusNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, now: Instant) {
        self.visible = true;
        if !self.navigation_mode {
            self.hide.arm(now, AUTO_HIDE);
        }
    }

    pub fn hide(&mut self) {
        self.force_reset();
    }

    pub fn left(&mut self, now: Instant) {
        self.step(-1, now);
    }

    pub fn right(&mut self, now: Instant) {
        self.step(1, now);
    }

    fn step(&mut self, delta: isize, now: Instant) {
        let last = TransportAction::RING.len() - 1;
        self.index = match (self.visible, self.index) {
            (true, Some(i)) => Some(i.saturating_add_signed(delta).min(last)),
            _ => Some(ENTRY_INDEX),
        };
        self.visible = true;
        self.navigation_mode = true;
        self.hide.arm(now, AUTO_HIDE);
        self.navigation_exit.arm(now, NAVIGATION_TIMEOUT);
    }

    /// The focused action, if any.  Leaves navigation mode and schedules a
    /// quick hide; the caller runs the action.
    pub fn activate(&mut self, now: Instant) -> Option<TransportAction> {
        if !self.visible {
            return None;
        }
        let action = self.index.and_then(|i| TransportAction::RING.get(i).copied())?;
        self.navigation_mode = false;
        self.navigation_exit.cancel();
        self.hide.arm(now, HIDE_AFTER_ACTIVATE);
        Some(action)
    }

    /// Hidden, nothing focused, navigation mode off, timers released.
    pub fn force_reset(&mut self) {
        self.visible = false;
        self.index = None;
        self.navigation_mode = false;
        self.hide.cancel();
        self.navigation_exit.cancel();
    }

    pub fn tick(&mut self, now: Instant) {
        if self.navigation_exit.fire(now) {
            self.navigation_mode = false;
            if self.visible {
                self.hide.arm(now, AUTO_HIDE);
            }
        }
        // a hide that comes due mid-navigation is skipped
        if self.hide.fire(now) && !self.navigation_mode {
            self.visible = false;
            self.index = None;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        earliest([self.hide.deadline(), self.navigation_exit.deadline()])
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn state(&self) -> FocusState {
        FocusState {
            visible: self.visible,
            index: self.index,
            navigation_mode: self.navigation_mode,
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
    fn test_arrow_on_hidden_ring_focuses_play_pause() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.right(t0);
        assert_eq!(
            nav.state(),
            FocusState {
                visible: true,
                index: Some(1),
                navigation_mode: true,
            }
        );
    }

    #[test]
    fn test_index_clamps_to_ring() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.left(t0);
        nav.left(t0);
        nav.left(t0);
        assert_eq!(nav.state().index, Some(0));
        for _ in 0..6 {
            nav.right(t0);
        }
        assert_eq!(nav.state().index, Some(3));
    }

    #[test]
    fn test_show_auto_hides_after_five_seconds() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.show(t0);
        nav.tick(t0 + Duration::from_millis(4999));
        assert!(nav.is_visible());
        nav.tick(t0 + secs(5));
        assert!(!nav.is_visible());
    }

    #[test]
    fn test_navigation_mode_holds_ring_until_exit_timer() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.right(t0);

        nav.tick(t0 + secs(5));
        assert!(nav.is_visible());

        nav.tick(t0 + secs(10));
        assert!(nav.is_visible());
        assert!(!nav.state().navigation_mode);

        nav.tick(t0 + secs(15));
        assert!(!nav.is_visible());
    }

    #[test]
    fn test_activate_returns_action_and_hides_quickly() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.right(t0);
        nav.right(t0);
        assert_eq!(nav.activate(t0 + secs(1)), Some(TransportAction::Stop));
        assert!(!nav.state().navigation_mode);

        nav.tick(t0 + secs(4));
        assert!(!nav.is_visible());
        assert_eq!(nav.activate(t0 + secs(4)), None);
    }

    #[test]
    fn test_activate_without_focus_is_noop() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.show(t0);
        assert_eq!(nav.activate(t0), None);
    }

    #[test]
    fn test_force_reset() {
        let t0 = Instant::now();
        let mut nav = ControlFocusNavigator::new();
        nav.right(t0);
        nav.force_reset();
        assert_eq!(nav.state(), FocusState::default());
        assert_eq!(nav.deadline(), None);
    }
}
