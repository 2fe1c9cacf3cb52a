mod action;
mod app;
mod component;
mod components;
mod core;
mod engine;
mod focus;
mod http;
mod input_buffer;
mod mpv;
mod notification;
mod playback;
mod reservation;
mod theme;
mod timer;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use karaoke_proto::catalog::{CatalogClient, SongId};
use karaoke_proto::config::Config;
use karaoke_proto::protocol::Command;
use karaoke_proto::state::StateManager;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;

/// What the core loop broadcasts to the UI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// A new snapshot is in the `StateManager`.
    StateUpdated,
}

#[derive(Parser, Debug)]
#[command(name = "karaoke")]
#[command(about = "Karaoke kiosk: song-number keypad, reservation queue, mpv playback")]
#[command(version)]
struct Args {
    /// Song number to start with, as if typed and entered
    #[arg(short, long, env = "KARAOKE_SONG")]
    song: Option<String>,

    /// Config file (default: <config dir>/karaoke/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not start the HTTP remote-control API
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = karaoke_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("karaoke.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; keep HTTP client internals quiet by default
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("karaoke log: {}", log_path.display());
    tracing::info!("karaoke starting…");

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: {}, using defaults", e);
            Config::default()
        }),
    };

    // Validate before the terminal goes raw so the error is readable.
    let startup_song = args
        .song
        .as_deref()
        .map(SongId::parse)
        .transpose()
        .map_err(|e| anyhow::anyhow!("--song: {}", e))?;

    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    let state_manager = Arc::new(StateManager::new(config.player.autoplay));
    let catalog = Arc::new(CatalogClient::new(config.catalog.base_url.clone())?);
    let engine = engine::MpvEngine::new(config.mpv.clone(), event_tx.clone());

    let player_core = core::PlayerCore::new(
        config.player.autoplay,
        Box::new(engine),
        catalog,
        state_manager.clone(),
        event_tx.clone(),
        broadcast_tx,
    );
    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    if config.http.enabled && !args.no_http {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state_manager.clone(),
            event_tx.clone(),
        );
    }

    if let Some(id) = startup_song {
        tracing::info!("startup song {}", id);
        event_tx
            .send(core::CoreEvent::Command(Command::Submit {
                song: id.to_string(),
            }))
            .await?;
    }

    let app = app::App::new(event_tx.clone(), state_manager);
    let result = app.run(broadcast_rx).await;

    let _ = event_tx.send(core::CoreEvent::Shutdown).await;
    if tokio::time::timeout(Duration::from_secs(3), core_task).await.is_err() {
        tracing::warn!("PlayerCore did not stop in time");
    }
    tracing::info!("karaoke exiting");
    result?;
    // the key reader is parked in a blocking read and would hold the runtime open
    std::process::exit(0)
}
