//! Song catalog: identifiers, lookup contract and the HTTP client.
//!
//! The kiosk never talks to the catalog directly from UI code.  The core
//! loop calls [`SongLookup::resolve`] on a background task and feeds the
//! reply back into the state machine as an event.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Hard limit for a single lookup, probe or commit.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest identifier the keypad can produce.
pub const MAX_SONG_DIGITS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SongIdError {
    #[error("song number is empty")]
    Empty,
    #[error("song number has more than 5 digits")]
    TooLong,
    #[error("song number may only contain digits")]
    NotDigits,
}

/// A song number as typed on the keypad: 1 to 5 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SongId(String);

impl SongId {
    pub fn parse(raw: &str) -> Result<Self, SongIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SongIdError::Empty);
        }
        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(SongIdError::NotDigits);
        }
        if raw.len() > MAX_SONG_DIGITS {
            return Err(SongIdError::TooLong);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SongId {
    type Error = SongIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SongId> for String {
    fn from(id: SongId) -> Self {
        id.0
    }
}

/// What the catalog returns for a known song number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl SongRecord {
    /// Title for display, falling back to `Song #<id>` when the catalog has none.
    pub fn display_title(&self, id: &SongId) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("Song #{}", id),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("connection timeout")]
    Timeout,
    #[error("song not found")]
    NotFound,
    #[error("{0}")]
    Transport(String),
}

/// How a lookup result will be used.  The catalog answers both the same
/// way; the mode only matters to the caller and to the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Resolve and load the song.
    Commit,
    /// Check existence / fetch the title without touching playback.
    Probe,
}

#[async_trait]
pub trait SongLookup: Send + Sync {
    async fn resolve(&self, id: &SongId, mode: LookupMode) -> Result<SongRecord, LookupError>;
}

/// `SongLookup` backed by the kiosk's song API (`GET <base>/song/<id>`).
pub struct CatalogClient {
    base_url: String,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn song_url(&self, id: &SongId) -> String {
        format!("{}/song/{}", self.base_url, id)
    }
}

#[async_trait]
impl SongLookup for CatalogClient {
    async fn resolve(&self, id: &SongId, mode: LookupMode) -> Result<SongRecord, LookupError> {
        let url = self.song_url(id);
        debug!("catalog: {:?} lookup {}", mode, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout
            } else {
                warn!("catalog: no response for {}: {}", id, e);
                LookupError::Transport("No response from server".to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            warn!("catalog: server error {} for {}", status, id);
            return Err(LookupError::Transport(format!(
                "Server error ({})",
                status.as_u16()
            )));
        }

        response.json::<SongRecord>().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout
            } else {
                LookupError::Transport(format!("Invalid catalog response: {}", e))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn song(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
        match id.as_str() {
            "500" => Ok(Json(json!({ "url": "https://videos.example/500.mp4", "title": "My Way" }))),
            "75" => Ok(Json(json!({ "url": "https://videos.example/75.mp4" }))),
            "999" => Err(StatusCode::INTERNAL_SERVER_ERROR),
            "7" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(Json(json!({ "url": "https://videos.example/7.mp4" })))
            }
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn mock_catalog() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/api/song/:id", get(song));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    fn id(s: &str) -> SongId {
        SongId::parse(s).unwrap()
    }

    #[test]
    fn test_song_id_validation() {
        assert_eq!(id("00042").as_str(), "00042");
        assert_eq!(id(" 12 ").as_str(), "12");
        assert_eq!(SongId::parse(""), Err(SongIdError::Empty));
        assert_eq!(SongId::parse("123456"), Err(SongIdError::TooLong));
        assert_eq!(SongId::parse("12a"), Err(SongIdError::NotDigits));
        assert_eq!(SongId::parse("STOP"), Err(SongIdError::NotDigits));
        // exact string match: leading zeros are significant
        assert_ne!(id("042"), id("42"));
    }

    #[test]
    fn test_display_title_fallback() {
        let untitled = SongRecord {
            url: "u".to_string(),
            title: Some("  ".to_string()),
        };
        assert_eq!(untitled.display_title(&id("75")), "Song #75");
        let titled = SongRecord {
            url: "u".to_string(),
            title: Some("Bohemian Rhapsody".to_string()),
        };
        assert_eq!(titled.display_title(&id("75")), "Bohemian Rhapsody");
    }

    #[tokio::test]
    async fn test_resolve_known_song() {
        let client = CatalogClient::new(mock_catalog().await).unwrap();
        let record = client.resolve(&id("500"), LookupMode::Commit).await.unwrap();
        assert_eq!(record.url, "https://videos.example/500.mp4");
        assert_eq!(record.title.as_deref(), Some("My Way"));

        let untitled = client.resolve(&id("75"), LookupMode::Probe).await.unwrap();
        assert_eq!(untitled.title, None);
    }

    #[tokio::test]
    async fn test_resolve_error_mapping() {
        let client = CatalogClient::new(mock_catalog().await).unwrap();
        assert_eq!(
            client.resolve(&id("404"), LookupMode::Probe).await,
            Err(LookupError::NotFound)
        );
        assert_eq!(
            client.resolve(&id("999"), LookupMode::Commit).await,
            Err(LookupError::Transport("Server error (500)".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolve_timeout() {
        let client =
            CatalogClient::with_timeout(mock_catalog().await, Duration::from_millis(200)).unwrap();
        assert_eq!(
            client.resolve(&id("7"), LookupMode::Commit).await,
            Err(LookupError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_resolve_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::new(format!("http://{}/api", addr)).unwrap();
        assert!(matches!(
            client.resolve(&id("500"), LookupMode::Commit).await,
            Err(LookupError::Transport(_))
        ));
    }
}
