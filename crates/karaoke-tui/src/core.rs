//! PlayerCore: single-owner event loop around the `PlaybackController`.
//!
//! Everything that can change the kiosk arrives here as a `CoreEvent`: key
//! presses from the TUI, commands from the HTTP API, mpv events, finished
//! catalog lookups.  The controller decides, the core carries out the
//! resulting effects (spawned lookups, engine commands), then publishes a
//! fresh snapshot to the `StateManager` and broadcasts `StateUpdated`.
//!
//! Timers live inside the controller as deadlines; the loop sleeps until the
//! earliest one and calls `tick`.  A 10 s heartbeat checks mpv liveness.

use std::collections::VecDeque;
use std::sync::Arc;

use karaoke_proto::catalog::{LookupError, SongId, SongLookup, SongRecord, LOOKUP_TIMEOUT};
use karaoke_proto::protocol::{Command, MpvHealth};
use karaoke_proto::state::StateManager;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::action::KioskKey;
use crate::engine::VideoEngine;
use crate::mpv::MpvEvent;
use crate::playback::{Effect, EngineCommand, LookupRequest, PlaybackController};
use crate::BroadcastMessage;

const HEARTBEAT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum CoreEvent {
    Key(KioskKey),
    /// From the HTTP API or the startup parameter.
    Command(Command),
    Mpv(MpvEvent),
    LookupFinished {
        request: LookupRequest,
        result: Result<SongRecord, LookupError>,
    },
    HeartbeatTick,
    Shutdown,
}

pub struct PlayerCore {
    controller: PlaybackController,
    engine: Box<dyn VideoEngine>,
    catalog: Arc<dyn SongLookup>,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    published_health: MpvHealth,
}

impl PlayerCore {
    pub fn new(
        autoplay: bool,
        engine: Box<dyn VideoEngine>,
        catalog: Arc<dyn SongLookup>,
        state_manager: Arc<StateManager>,
        event_tx: mpsc::Sender<CoreEvent>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) -> Self {
        Self {
            controller: PlaybackController::new(autoplay),
            engine,
            catalog,
            state_manager,
            event_tx,
            broadcast_tx,
            published_health: MpvHealth::Absent,
        }
    }

    /// Returns on `Shutdown` or when every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        self.publish().await;

        loop {
            let deadline = self.controller.next_deadline();
            let effects = tokio::select! {
                evt = event_rx.recv() => match evt {
                    None => {
                        info!("PlayerCore: event channel closed");
                        break;
                    }
                    Some(CoreEvent::Shutdown) => {
                        info!("PlayerCore: shutdown requested");
                        break;
                    }
                    Some(evt) => self.handle_event(evt).await,
                },
                _ = sleep_until(deadline) => self.controller.tick(Instant::now()),
            };
            self.apply(effects).await;
            self.publish().await;
        }

        self.engine.shutdown().await;
        Ok(())
    }

    async fn handle_event(&mut self, evt: CoreEvent) -> Vec<Effect> {
        let now = Instant::now();
        match evt {
            CoreEvent::Key(key) => self.controller.handle_key(key, now),
            CoreEvent::Command(cmd) => self.handle_command(cmd, now),
            CoreEvent::Mpv(evt) => {
                if let Some(reason) = evt.load_error() {
                    warn!("PlayerCore: mpv could not play file: {}", reason);
                    return self.controller.engine_failed(now);
                }
                match evt.engine_signal() {
                    Some(signal) => self.controller.on_engine(signal, now),
                    None => {
                        debug!("PlayerCore: mpv event {:?}", evt.event_name());
                        Vec::new()
                    }
                }
            }
            CoreEvent::LookupFinished { request, result } => {
                self.controller.on_lookup(request, result, now)
            }
            CoreEvent::HeartbeatTick => {
                self.engine.check_alive().await;
                Vec::new()
            }
            CoreEvent::Shutdown => Vec::new(),
        }
    }

    fn handle_command(&mut self, cmd: Command, now: Instant) -> Vec<Effect> {
        info!("PlayerCore: command {:?}", cmd);
        match cmd {
            Command::Submit { song } => match SongId::parse(&song) {
                Ok(id) => self.controller.submit(id, now),
                Err(e) => {
                    warn!("PlayerCore: rejected song '{}': {}", song, e);
                    Vec::new()
                }
            },
            Command::PlayReservation { index } => self.controller.play_reservation(index, now),
            Command::PlayNextOrStop => self.controller.play_next_or_stop(now),
            Command::Stop => self.controller.stop(now),
            Command::TogglePause => self.controller.toggle_pause(now),
            Command::ToggleReserve => self.controller.toggle_reserve(now),
            Command::SetAutoplay { enabled } => self.controller.set_autoplay(enabled, now),
            Command::SeekTo { fraction } => self.controller.seek_to(fraction, now),
        }
    }

    /// Carry out effects.  An engine failure on load feeds back into the
    /// controller, whose follow-up effects are run in turn.
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Lookup(request) => self.spawn_lookup(request),
                Effect::Engine(cmd) => {
                    let is_load = matches!(cmd, EngineCommand::Load { .. });
                    if let Err(e) = self.engine.execute(cmd).await {
                        warn!("PlayerCore: engine command failed: {}", e);
                        if is_load {
                            queue.extend(self.controller.engine_failed(Instant::now()));
                        }
                    }
                }
            }
        }
    }

    fn spawn_lookup(&self, request: LookupRequest) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mode = request.mode();
            let result = tokio::time::timeout(LOOKUP_TIMEOUT, catalog.resolve(&request.id, mode))
                .await
                .unwrap_or(Err(LookupError::Timeout));
            debug!("lookup {} ({:?}) → {:?}", request.id, request.purpose, result);
            let _ = tx.send(CoreEvent::LookupFinished { request, result }).await;
        });
    }

    async fn publish(&mut self) {
        let health = self.engine.health();
        if health != self.published_health {
            self.state_manager.set_mpv_health(health.clone()).await;
            self.published_health = health;
        }
        self.state_manager.publish(self.controller.snapshot()).await;
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
