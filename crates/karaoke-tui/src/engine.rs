//! The video engine as the core loop sees it.
//!
//! `MpvEngine` owns the mpv process and connection, spawning mpv lazily on
//! the first load and respawning it after a crash.  Its events are forwarded
//! into the core loop's channel.

use async_trait::async_trait;
use karaoke_proto::config::MpvConfig;
use karaoke_proto::protocol::MpvHealth;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::CoreEvent;
use crate::mpv::{MpvDriver, MpvEvent, MpvHandle};
use crate::playback::EngineCommand;

#[async_trait]
pub trait VideoEngine: Send {
    async fn execute(&mut self, cmd: EngineCommand) -> anyhow::Result<()>;
    fn health(&self) -> MpvHealth;
    /// Heartbeat: notice a dead process.
    async fn check_alive(&mut self);
    async fn shutdown(&mut self);
}

pub struct MpvEngine {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    health: MpvHealth,
    core_tx: mpsc::Sender<CoreEvent>,
}

impl MpvEngine {
    pub fn new(config: MpvConfig, core_tx: mpsc::Sender<CoreEvent>) -> Self {
        Self {
            driver: MpvDriver::new(config),
            handle: None,
            health: MpvHealth::Absent,
            core_tx,
        }
    }

    fn set_health(&mut self, health: MpvHealth) {
        if self.health != health {
            info!("engine: mpv health {:?} → {:?}", self.health, health);
            self.health = health;
        }
    }

    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("engine: mpv died, dropping handle");
            self.handle = None;
            self.set_health(MpvHealth::Dead);
        }
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        // one forwarder per connection
        let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = self.core_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = event_rx.recv().await {
                if core_tx.send(CoreEvent::Mpv(evt)).await.is_err() {
                    break;
                }
            }
        });

        let handle = match self.driver.try_reconnect(event_tx.clone()).await {
            Some(h) => {
                info!("engine: reusing running mpv");
                h
            }
            None => {
                self.set_health(MpvHealth::Starting);
                match self.driver.spawn_and_connect(event_tx).await {
                    Ok(h) => h,
                    Err(e) => {
                        self.set_health(MpvHealth::Dead);
                        return Err(e);
                    }
                }
            }
        };
        handle.observe_properties().await;
        self.set_health(MpvHealth::Running);
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

#[async_trait]
impl VideoEngine for MpvEngine {
    async fn execute(&mut self, cmd: EngineCommand) -> anyhow::Result<()> {
        if let EngineCommand::Load { url } = &cmd {
            let handle = self.ensure_handle().await?;
            return handle.load(url).await;
        }
        // nothing loaded means nothing to control
        let Some(handle) = self.handle.clone() else {
            return Ok(());
        };
        match cmd {
            EngineCommand::Play => handle.set_pause(false).await,
            EngineCommand::Pause => handle.set_pause(true).await,
            EngineCommand::SeekTo(fraction) => handle.seek_fraction(fraction).await,
            EngineCommand::Stop => handle.stop().await,
            EngineCommand::Load { .. } => Ok(()),
        }
    }

    fn health(&self) -> MpvHealth {
        self.health.clone()
    }

    async fn check_alive(&mut self) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        if !self.driver.process_alive() {
            warn!("engine: heartbeat found mpv dead");
        } else if let Err(e) = handle.ping().await {
            warn!("engine: mpv not answering: {}", e);
        } else {
            return;
        }
        self.handle = None;
        self.set_health(MpvHealth::Dead);
    }

    async fn shutdown(&mut self) {
        info!("engine: shutting down mpv");
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop().await;
        }
        self.driver.kill().await;
    }
}
