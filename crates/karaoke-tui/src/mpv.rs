//! mpv JSON IPC driver: the video engine behind the kiosk.
//!
//! ```text
//!   MpvDriver::spawn_and_connect()
//!         │
//!         ├── writer_task   ← MpvRequest via mpsc → JSON line → socket
//!         └── reader_task   ← JSON lines from socket
//!                                ├── reply (request_id)       → waiting oneshot
//!                                └── event / property-change  → event channel
//! ```
//!
//! `MpvHandle` is cheap to clone; `send(cmd)` resolves with mpv's reply.
//! `MpvDriver` owns the child process.  Unix uses a domain socket, Windows a
//! named pipe (`\\.\pipe\<name>`).

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use karaoke_proto::config::MpvConfig;
use karaoke_proto::platform;

use crate::playback::EngineSignal;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

// observe_property ids, matched in property-change events
pub const OBS_PAUSE: u64 = 1;
pub const OBS_PERCENT_POS: u64 = 2;
pub const OBS_DURATION: u64 = 3;

type ReplySlot = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, ReplySlot>>>;

struct MpvRequest {
    req_id: u64,
    /// Serialised command, newline-terminated.
    line: String,
    reply: ReplySlot,
}

/// Anything mpv sends without a request_id.
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    fn end_reason(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        self.raw.get("reason")?.as_str()
    }

    /// What this event means for playback, if anything.
    ///
    /// `end-file` with reason `stop` is our own `stop`/`loadfile` replacing
    /// the file and is not an end of media.
    pub fn engine_signal(&self) -> Option<EngineSignal> {
        if let Some((id, data)) = self.as_property_change() {
            return match id {
                OBS_PAUSE => data.as_bool().map(|paused| {
                    if paused {
                        EngineSignal::Pause
                    } else {
                        EngineSignal::Play
                    }
                }),
                OBS_PERCENT_POS => data.as_f64().map(|pct| EngineSignal::Progress(pct / 100.0)),
                OBS_DURATION => data.as_f64().map(EngineSignal::DurationKnown),
                _ => None,
            };
        }
        match self.event_name()? {
            "file-loaded" => Some(EngineSignal::Ready),
            "end-file" if self.end_reason() == Some("eof") => Some(EngineSignal::Ended),
            _ => None,
        }
    }

    /// mpv gave up on the file it was asked to load.
    pub fn load_error(&self) -> Option<String> {
        if self.end_reason()? != "error" {
            return None;
        }
        Some(
            self.raw
                .get("file_error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string(),
        )
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<MpvRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&json!({ "command": command, "request_id": req_id }))?;
        line.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(MpvRequest {
                req_id,
                line,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Replace whatever is showing with `url` and start it.
    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        self.set_pause(false).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    /// Seek to `fraction` (0..1) of the video.
    pub async fn seek_fraction(&self, fraction: f64) -> anyhow::Result<()> {
        let pct = (fraction * 100.0).clamp(0.0, 100.0);
        self.send(json!(["seek", pct, "absolute-percent"])).await?;
        Ok(())
    }

    /// Must be repeated on every fresh connection.
    pub async fn observe_properties(&self) {
        let props = [
            (OBS_PAUSE, "pause"),
            (OBS_PERCENT_POS, "percent-pos"),
            (OBS_DURATION, "duration"),
        ];
        for (id, name) in props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observing {} as {}", name, id),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.send(json!(["get_property", "idle-active"])).await?;
        Ok(())
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

pub struct MpvDriver {
    pub socket_name: String,
    config: MpvConfig,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new(config: MpvConfig) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            config,
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                match status.code() {
                    Some(code) => warn!("mpv exited with code {}", code),
                    None => warn!("mpv terminated by signal"),
                }
                false
            }
            Err(e) => {
                warn!("mpv liveness check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn command(&self) -> anyhow::Result<tokio::process::Command> {
        let binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let volume = (self.config.default_volume * 100.0).clamp(0.0, 100.0).round() as i64;

        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("--force-window=yes")
            .arg("--idle=yes")
            .arg("--keep-open=no")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!("--volume={}", volume))
            .args(&self.config.extra_args)
            .stdout(std::process::Stdio::null());
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        let stderr_path = platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = self.command()?.stderr(stderr_file).spawn()?;
        info!("mpv: spawned pid {:?}, stderr → {:?}", child.id(), stderr_path);
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to {}", self.socket_name);
        Ok(start_io_tasks(stream, event_tx))
    }

    /// Attach to an mpv left over from a previous run.
    #[cfg(unix)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        if !socket_path.exists() {
            return None;
        }
        match UnixStream::connect(&socket_path).await {
            Ok(stream) => Some(start_io_tasks(stream, event_tx)),
            Err(e) => {
                debug!("mpv: stale socket {}: {}", self.socket_name, e);
                None
            }
        }
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let child = self
            .command()?
            .stderr(std::process::Stdio::null())
            .spawn()?;
        info!("mpv: spawned pid {:?}", child.id());
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to {}", pipe_path);
                return Ok(start_io_tasks(client, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    #[cfg(windows)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        ClientOptions::new()
            .open(&pipe_path)
            .ok()
            .map(|client| start_io_tasks(client, event_tx))
    }
}

fn start_io_tasks<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = mpsc::channel::<MpvRequest>(64);

    tokio::spawn(writer_task(write_half, rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    for (_, slot) in pending.lock().await.drain() {
        let _ = slot.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Err(e) => {
                warn!("mpv reader: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let val: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                debug!("mpv reader: bad json '{}': {}", trimmed, e);
                continue;
            }
        };

        let Some(req_id) = val.get("request_id").and_then(Value::as_u64) else {
            if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                break;
            }
            continue;
        };
        let Some(slot) = pending.lock().await.remove(&req_id) else {
            debug!("mpv reader: reply for unknown req={}", req_id);
            continue;
        };
        let result = match val["error"].as_str() {
            Some("success") => Ok(val),
            other => Err(anyhow::anyhow!("mpv error: {}", other.unwrap_or("unknown error"))),
        };
        let _ = slot.send(result);
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<MpvRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // registered first so the reader can always find it
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.line.trim());
        if let Err(e) = writer.write_all(req.line.as_bytes()).await {
            warn!("mpv writer: {}", e);
            if let Some(slot) = pending.lock().await.remove(&req.req_id) {
                let _ = slot.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_property_changes_map_to_signals() {
        let pause = event(json!({"event": "property-change", "id": OBS_PAUSE, "name": "pause", "data": true}));
        assert_eq!(pause.engine_signal(), Some(EngineSignal::Pause));

        let pos = event(json!({"event": "property-change", "id": OBS_PERCENT_POS, "data": 25.0}));
        assert_eq!(pos.engine_signal(), Some(EngineSignal::Progress(0.25)));

        let dur = event(json!({"event": "property-change", "id": OBS_DURATION, "data": null}));
        assert_eq!(dur.engine_signal(), None);
    }

    #[test]
    fn test_end_file_reasons() {
        let eof = event(json!({"event": "end-file", "reason": "eof"}));
        assert_eq!(eof.engine_signal(), Some(EngineSignal::Ended));
        assert_eq!(eof.load_error(), None);

        let replaced = event(json!({"event": "end-file", "reason": "stop"}));
        assert_eq!(replaced.engine_signal(), None);

        let failed = event(json!({"event": "end-file", "reason": "error", "file_error": "loading failed"}));
        assert_eq!(failed.engine_signal(), None);
        assert_eq!(failed.load_error().as_deref(), Some("loading failed"));

        let loaded = event(json!({"event": "file-loaded"}));
        assert_eq!(loaded.engine_signal(), Some(EngineSignal::Ready));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_replies_and_events_are_routed() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(ours, event_tx);

        let fake_mpv = tokio::spawn(async move {
            let (r, mut w) = tokio::io::split(theirs);
            let mut lines = BufReader::new(r).lines();
            let cmd: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(cmd["command"], json!(["get_property", "idle-active"]));
            let id = cmd["request_id"].as_u64().unwrap();
            w.write_all(b"{\"event\":\"end-file\",\"reason\":\"eof\"}\n").await.unwrap();
            w.write_all(format!("{{\"request_id\":{},\"error\":\"success\",\"data\":true}}\n", id).as_bytes())
                .await
                .unwrap();
        });

        handle.ping().await.unwrap();
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(evt.engine_signal(), Some(EngineSignal::Ended));
        fake_mpv.await.unwrap();
    }
}
