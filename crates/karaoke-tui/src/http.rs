//! Remote-control HTTP API.  Every mutating route forwards a `Command` to the
//! core loop and returns immediately; results show up in `GET /api/state`.

use crate::core::CoreEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use karaoke_proto::catalog::SongId;
use karaoke_proto::protocol::{Command, PlayerState};
use karaoke_proto::state::StateManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct HttpState {
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
}

pub fn router(state_manager: Arc<StateManager>, event_tx: mpsc::Sender<CoreEvent>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/submit/:song", post(submit))
        .route("/api/stop", post(stop))
        .route("/api/next", post(next))
        .route("/api/pause", post(toggle_pause))
        .route("/api/reserve", post(toggle_reserve))
        .route("/api/queue/:index/play", post(play_reservation))
        .route("/api/autoplay/:enabled", post(set_autoplay))
        .route("/api/seek/:fraction", post(seek))
        .layer(CorsLayer::permissive())
        .with_state(HttpState {
            state_manager,
            event_tx,
        })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state_manager, event_tx);
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("HTTP: failed to bind {}: {}", addr, e);
                return;
            }
        };
        info!("HTTP API listening on http://{}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(CoreEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: core loop is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn get_state(State(state): State<HttpState>) -> Json<PlayerState> {
    Json(state.state_manager.get_state().await)
}

async fn submit(State(state): State<HttpState>, Path(song): Path<String>) -> StatusCode {
    if let Err(e) = SongId::parse(&song) {
        warn!("HTTP API: bad song number '{}': {}", song, e);
        return StatusCode::BAD_REQUEST;
    }
    forward(&state, Command::Submit { song }).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::Stop).await
}

async fn next(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::PlayNextOrStop).await
}

async fn toggle_pause(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::TogglePause).await
}

async fn toggle_reserve(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::ToggleReserve).await
}

async fn play_reservation(State(state): State<HttpState>, Path(index): Path<usize>) -> StatusCode {
    forward(&state, Command::PlayReservation { index }).await
}

async fn set_autoplay(State(state): State<HttpState>, Path(enabled): Path<bool>) -> StatusCode {
    forward(&state, Command::SetAutoplay { enabled }).await
}

async fn seek(State(state): State<HttpState>, Path(fraction): Path<f64>) -> StatusCode {
    if !(0.0..=1.0).contains(&fraction) {
        return StatusCode::BAD_REQUEST;
    }
    forward(&state, Command::SeekTo { fraction }).await
}
