use crate::protocol::{MpvHealth, PlayerState};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, read-mostly view of the kiosk.  Only the core loop writes; the
/// UI and the HTTP API read snapshots.
pub struct StateManager {
    state: Arc<RwLock<PlayerState>>,
}

impl StateManager {
    pub fn new(autoplay: bool) -> Self {
        let state = PlayerState {
            rev: 1,
            autoplay,
            ..Default::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    /// Replace the snapshot, keeping the revision counter and engine health
    /// (those are owned here, not by the state machine).
    pub async fn publish(&self, mut snapshot: PlayerState) {
        let mut state = self.state.write().await;
        snapshot.rev = state.rev + 1;
        snapshot.mpv_health = state.mpv_health.clone();
        *state = snapshot;
    }

    pub async fn set_mpv_health(&self, health: MpvHealth) {
        let mut state = self.state.write().await;
        state.mpv_health = health;
        state.rev += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlaybackStatus;

    #[tokio::test]
    async fn test_publish_bumps_rev_and_keeps_health() {
        let manager = StateManager::new(true);
        manager.set_mpv_health(MpvHealth::Running).await;
        let before = manager.get_state().await;

        manager
            .publish(PlayerState {
                status: PlaybackStatus::Playing,
                queue: vec!["101".to_string()],
                ..Default::default()
            })
            .await;

        let after = manager.get_state().await;
        assert_eq!(after.rev, before.rev + 1);
        assert_eq!(after.status, PlaybackStatus::Playing);
        assert_eq!(after.mpv_health, MpvHealth::Running);
        assert_eq!(after.queue, vec!["101".to_string()]);
    }
}
