use serde::{Deserialize, Serialize};

/// Operator commands that do not originate from the keypad (HTTP remote,
/// startup parameter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Same as typing `song` and pressing Enter: play now when idle,
    /// otherwise probe and reserve.
    Submit { song: String },
    /// Play reservation `index` now, dropping every earlier reservation.
    PlayReservation { index: usize },
    PlayNextOrStop,
    Stop,
    TogglePause,
    ToggleReserve,
    SetAutoplay { enabled: bool },
    SeekTo { fraction: f64 },
}

/// Playback status of the kiosk surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No session.
    #[default]
    Idle,
    /// Commit lookup in flight.
    Loading,
    /// Session loaded, engine running.
    Playing,
    /// Session loaded, engine paused.
    Paused,
    /// Session kept but forced paused behind the RESERVED overlay.
    ReservedHold,
}

impl PlaybackStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Loading => "LOADING",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::ReservedHold => "RESERVED",
        }
    }
}

/// Health of the mpv process as observed by the core.
///
/// Transitions:
///   Absent -> Starting -> Running -> Dead -> Starting ...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum MpvHealth {
    /// mpv process does not exist yet (before first use).
    #[default]
    Absent,
    /// Process is spawning / socket not yet available.
    Starting,
    /// Socket connected, IPC responding normally.
    Running,
    /// Process exited or socket closed.
    Dead,
}

impl MpvHealth {
    /// Short label for badges (≤5 chars).
    pub fn badge_label(&self) -> Option<&str> {
        match self {
            MpvHealth::Absent => None,
            MpvHealth::Starting => Some("INIT"),
            MpvHealth::Running => None,
            MpvHealth::Dead => Some("DEAD"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationKind {
    Success,
    Error,
}

/// What the reservation panel shows right now.  Recomputed from the
/// arbiter on every state publish; never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type")]
pub enum Notification {
    /// Nothing to announce: the panel lists the reservation queue.
    #[default]
    Idle,
    ValidationMessage { text: String, kind: ValidationKind },
    UpcomingSongHint { title: String },
    TypedDigits { text: String },
}

/// The four on-screen transport buttons, in ring order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportAction {
    SeekBackward,
    PlayPause,
    /// Becomes "play next or stop" while reservations are pending.
    Stop,
    SeekForward,
}

impl TransportAction {
    pub const RING: [TransportAction; 4] = [
        TransportAction::SeekBackward,
        TransportAction::PlayPause,
        TransportAction::Stop,
        TransportAction::SeekForward,
    ];

    pub fn label(self, queue_pending: bool) -> &'static str {
        match self {
            Self::SeekBackward => "« -5%",
            Self::PlayPause => "Play/Pause",
            Self::Stop if queue_pending => "Next/Stop",
            Self::Stop => "Stop",
            Self::SeekForward => "+5% »",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FocusState {
    pub visible: bool,
    /// Focused button in `TransportAction::RING`; `None` when nothing is focused.
    pub index: Option<usize>,
    pub navigation_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NowPlaying {
    pub song: String,
    pub title: String,
}

/// Snapshot of the kiosk published after every handled event.  `rev` is a
/// monotonically increasing counter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    pub status: PlaybackStatus,
    pub now_playing: Option<NowPlaying>,
    pub queue: Vec<String>,
    /// Highlighted reservation while in `ReservedHold`.
    pub queue_cursor: Option<usize>,
    pub autoplay: bool,
    pub notification: Notification,
    pub focus: FocusState,
    /// Fraction of the current video played, 0.0..=1.0.
    pub progress: f64,
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub mpv_health: MpvHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = Command::Submit {
            song: "500".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"cmd":"Submit","song":"500"}"#);
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_notification_is_tagged() {
        let n = Notification::UpcomingSongHint {
            title: "Coming Next: My Way".to_string(),
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "UpcomingSongHint");
        assert_eq!(v["title"], "Coming Next: My Way");
    }

    #[test]
    fn test_validation_message_keeps_its_kind_field() {
        let n = Notification::ValidationMessage {
            text: "Song 9 not found".to_string(),
            kind: ValidationKind::Error,
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "ValidationMessage");
        assert_eq!(v["kind"], "Error");
        let back: Notification = serde_json::from_value(v).unwrap();
        assert_eq!(back, n);

        let state = PlayerState {
            notification: n,
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: PlayerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.notification, state.notification);
    }

    #[test]
    fn test_stop_button_relabels_with_pending_queue() {
        assert_eq!(TransportAction::Stop.label(false), "Stop");
        assert_eq!(TransportAction::Stop.label(true), "Next/Stop");
        assert_eq!(TransportAction::RING[1], TransportAction::PlayPause);
    }
}
