/// mpv media backend over JSON IPC.
///
/// Architecture:
///
/// ```text
///   MpvBackend (MediaBackend impl, called by PlayerCore)
///         │  BackendCommand via unbounded mpsc, strictly in order
///         ▼
///   backend_task  ── owns MpvDriver, (re)spawns mpv on demand
///         ├── writer_task   ← MpvRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → EventTranslator
///                                                                   → CoreEvent::Backend
/// ```
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rider_core::backend::MediaBackend;
use rider_core::config::PlayerConfig;
use rider_core::protocol::BackendEvent;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::core::CoreEvent;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

/// Fixed observe_property IDs.  We match on these in property-change events.
pub const OBS_PAUSE: u64 = 1;
pub const OBS_TIME_POS: u64 = 2;
pub const OBS_DURATION: u64 = 3;
pub const OBS_PERCENT_POS: u64 = 4;
pub const OBS_PAUSED_FOR_CACHE: u64 = 5;
pub const OBS_CACHE_TIME: u64 = 6;
pub const OBS_EOF_REACHED: u64 = 7;

const OBSERVED: [(u64, &str); 7] = [
    (OBS_PAUSE, "pause"),
    (OBS_TIME_POS, "time-pos"),
    (OBS_DURATION, "duration"),
    (OBS_PERCENT_POS, "percent-pos"),
    (OBS_PAUSED_FOR_CACHE, "paused-for-cache"),
    (OBS_CACHE_TIME, "demuxer-cache-time"),
    (OBS_EOF_REACHED, "eof-reached"),
];

/// Minimum playback advance between two `Progress` events.
const PROGRESS_STEP_SECS: f64 = 0.25;

// ── internal channel types ────────────────────────────────────────────────────

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `eof`, `stop`, `quit`, `error`, `redirect` for end-file events.
    pub fn end_file_reason(&self) -> Option<&str> {
        self.raw.get("reason")?.as_str()
    }

    pub fn file_error(&self) -> Option<&str> {
        self.raw.get("file_error")?.as_str()
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.  Use `send()` to fire a command
/// and await the response.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn seek_percent(&self, percent: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", percent.clamp(0.0, 100.0), "absolute-percent"]))
            .await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    /// Register observe_property for everything the translator reads.
    /// Must be called after every fresh connection.
    pub async fn observe_all_properties(&self) {
        for (id, name) in &OBSERVED {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    mpv_path: Option<PathBuf>,
    ytdl_path: Option<PathBuf>,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            socket_name: rider_core::platform::mpv_socket_name(),
            mpv_path: config.mpv_path.clone(),
            ytdl_path: config.ytdl_path.clone(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(None) => true, // Still running
                Ok(Some(status)) => {
                    if let Some(code) = status.code() {
                        warn!("mpv process exited with code: {}", code);
                    } else {
                        warn!("mpv process terminated by signal");
                    }
                    false
                }
                Err(e) => {
                    warn!("mpv process_alive check failed: {}", e);
                    false
                }
            }
        } else {
            false
        }
    }

    /// Kill the process if running.
    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn command(&self) -> anyhow::Result<tokio::process::Command> {
        let mpv_binary = rider_core::platform::find_mpv_binary(self.mpv_path.as_deref())
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let mut cmd = tokio::process::Command::new(mpv_binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            // Finished files stay loaded so play can seek back and replay.
            .arg("--keep-open=yes")
            .arg("--quiet")
            .arg("--ytdl-format=bestaudio/best")
            .arg(rider_core::platform::mpv_socket_arg())
            .stdout(std::process::Stdio::null())
            .kill_on_drop(true);

        match rider_core::platform::find_yt_dlp_binary(self.ytdl_path.as_deref()) {
            Some(ytdl) => {
                cmd.arg(format!("--script-opts=ytdl_hook-ytdl_path={}", ytdl.display()));
            }
            None => debug!("mpv: yt-dlp not found, watch-page sources will fail"),
        }
        Ok(cmd)
    }

    // ── spawn ─────────────────────────────────────────────────────────────────

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        // Kill stale process
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let stderr_path = rider_core::platform::data_dir().join("mpv-stderr.log");
        if let Some(parent) = stderr_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let child = self.command()?.stderr(stderr_file).spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        info!("mpv: spawning new process");
        let child = self
            .command()?
            .stderr(std::process::Stdio::null())
            .spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            match ClientOptions::new().open(&pipe_path) {
                Ok(client) => {
                    info!("mpv: connected to named pipe");
                    let (read_half, write_half) = tokio::io::split(client);
                    return Ok(start_io_tasks(read_half, write_half, event_tx));
                }
                Err(_) => continue,
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // pending map: req_id → reply channel.  Shared between writer (inserts) and reader (resolves).
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    // Command response: route to pending request
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── event translation ─────────────────────────────────────────────────────────

/// Folds mpv's property stream into the backend callbacks the controller
/// understands.
#[derive(Debug, Default)]
pub struct EventTranslator {
    time_pos: Option<f64>,
    percent_pos: Option<f64>,
    duration: Option<f64>,
    cache_time: Option<f64>,
    last_emitted: Option<f64>,
}

impl EventTranslator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn translate(&mut self, evt: &MpvEvent) -> Option<BackendEvent> {
        if let Some((id, data)) = evt.as_property_change() {
            return match id {
                OBS_PAUSE => (data.as_bool() == Some(true)).then_some(BackendEvent::Paused),
                OBS_EOF_REACHED => (data.as_bool() == Some(true)).then_some(BackendEvent::Ended),
                OBS_PAUSED_FOR_CACHE => data.as_bool().map(|stalled| {
                    if stalled {
                        BackendEvent::Buffer
                    } else {
                        BackendEvent::BufferEnd
                    }
                }),
                OBS_DURATION => {
                    self.duration = data.as_f64();
                    self.duration.map(|seconds| BackendEvent::Duration { seconds })
                }
                OBS_PERCENT_POS => {
                    self.percent_pos = data.as_f64();
                    None
                }
                OBS_CACHE_TIME => {
                    self.cache_time = data.as_f64();
                    None
                }
                OBS_TIME_POS => {
                    self.time_pos = data.as_f64();
                    self.progress()
                }
                _ => None,
            };
        }

        match evt.event_name()? {
            "start-file" => {
                self.reset();
                None
            }
            "file-loaded" => Some(BackendEvent::Ready),
            "end-file" => match evt.end_file_reason() {
                Some("eof") => Some(BackendEvent::Ended),
                Some("error") => Some(BackendEvent::Error {
                    reason: evt.file_error().unwrap_or("error").to_string(),
                }),
                _ => None,
            },
            _ => None,
        }
    }

    fn progress(&mut self) -> Option<BackendEvent> {
        let time = self.time_pos?;
        if let Some(last) = self.last_emitted {
            if (time - last).abs() < PROGRESS_STEP_SECS {
                return None;
            }
        }
        self.last_emitted = Some(time);

        let duration = self.duration.filter(|d| *d > 0.0);
        let played = match (self.percent_pos, duration) {
            (Some(pct), _) => pct / 100.0,
            (None, Some(d)) => time / d,
            _ => 0.0,
        };
        let loaded_seconds = self.cache_time.map_or(time, |c| c.max(time));
        let loaded = duration.map_or(0.0, |d| (loaded_seconds / d).min(1.0));

        Some(BackendEvent::Progress {
            played: played.clamp(0.0, 1.0),
            played_seconds: time,
            loaded,
            loaded_seconds,
        })
    }
}

// ── MediaBackend implementation ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Stop,
}

/// `MediaBackend` handed to `PlayerCore`.  Calls are queued and executed in
/// order by `backend_task`.
pub struct MpvBackend {
    tx: mpsc::UnboundedSender<BackendCommand>,
}

impl MpvBackend {
    pub fn spawn(
        driver: MpvDriver,
        core_tx: mpsc::Sender<CoreEvent>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(backend_task(driver, rx, core_tx));
        (Self { tx }, task)
    }

    fn enqueue(&self, cmd: BackendCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("mpv: backend task gone, command dropped");
        }
    }
}

impl MediaBackend for MpvBackend {
    fn load(&mut self, url: &str) {
        self.enqueue(BackendCommand::Load(url.to_string()));
    }

    fn play(&mut self) {
        self.enqueue(BackendCommand::Play);
    }

    fn pause(&mut self) {
        self.enqueue(BackendCommand::Pause);
    }

    fn seek(&mut self, fraction: f64) {
        self.enqueue(BackendCommand::Seek(fraction));
    }

    fn stop(&mut self) {
        self.enqueue(BackendCommand::Stop);
    }
}

async fn ensure_handle(
    driver: &mut MpvDriver,
    handle: &mut Option<MpvHandle>,
    mpv_tx: &mpsc::Sender<MpvEvent>,
) -> Option<MpvHandle> {
    if handle.is_some() && !driver.process_alive() {
        warn!("mpv: process died, dropping handle");
        *handle = None;
    }

    if handle.is_none() {
        match driver.spawn_and_connect(mpv_tx.clone()).await {
            Ok(h) => {
                h.observe_all_properties().await;
                *handle = Some(h);
            }
            Err(e) => {
                warn!("mpv: failed to start: {}", e);
                return None;
            }
        }
    }

    handle.clone()
}

async fn run_command(handle: &MpvHandle, cmd: &BackendCommand) -> anyhow::Result<()> {
    match cmd {
        BackendCommand::Load(url) => handle.load(url).await,
        BackendCommand::Play => handle.set_pause(false).await,
        BackendCommand::Pause => handle.set_pause(true).await,
        BackendCommand::Seek(fraction) => handle.seek_percent(fraction * 100.0).await,
        BackendCommand::Stop => handle.stop().await,
    }
}

/// Counts the loads sent to mpv so each event can be tagged with the load it
/// belongs to.  Between a `loadfile` and its `start-file`, mpv is still
/// reporting on the file being replaced; those events are dropped.
#[derive(Debug, Default)]
struct LoadCounter {
    loads: u64,
    pending_starts: u32,
}

impl LoadCounter {
    fn issued(&mut self) {
        self.loads += 1;
        self.pending_starts += 1;
    }

    /// The load never reached mpv, so no `start-file` will follow.
    fn failed(&mut self) {
        self.pending_starts = self.pending_starts.saturating_sub(1);
    }

    /// mpv went away; nothing is pending any more.
    fn settle(&mut self) {
        self.pending_starts = 0;
    }

    fn current(&self) -> u64 {
        self.loads
    }

    /// The generation to tag `evt` with, or `None` if it predates the
    /// latest load.
    fn accept(&mut self, evt: &MpvEvent) -> Option<u64> {
        if evt.event_name() == Some("start-file") {
            self.pending_starts = self.pending_starts.saturating_sub(1);
        } else if self.pending_starts > 0 {
            return None;
        }
        Some(self.loads)
    }
}

async fn backend_task(
    mut driver: MpvDriver,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    core_tx: mpsc::Sender<CoreEvent>,
) {
    info!("mpv: backend task starting");
    let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(256);
    let mut handle: Option<MpvHandle> = None;
    let mut translator = EventTranslator::default();
    let mut media_loaded = false;
    let mut loads = LoadCounter::default();
    let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(10));

    let report = |generation: u64, event: BackendEvent| {
        let tx = core_tx.clone();
        async move {
            let _ = tx.send(CoreEvent::Backend { generation, event }).await;
        }
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let is_load = matches!(cmd, BackendCommand::Load(_));
                if is_load {
                    loads.issued();
                }
                let Some(h) = ensure_handle(&mut driver, &mut handle, &mpv_tx).await else {
                    if is_load {
                        loads.failed();
                        report(loads.current(), BackendEvent::Error { reason: "mpv unavailable".into() }).await;
                    }
                    continue;
                };
                match run_command(&h, &cmd).await {
                    Ok(()) => match cmd {
                        BackendCommand::Load(_) => media_loaded = true,
                        BackendCommand::Stop => media_loaded = false,
                        _ => {}
                    },
                    Err(e) => {
                        warn!("mpv: {:?} failed: {}", cmd, e);
                        if is_load {
                            loads.failed();
                            report(loads.current(), BackendEvent::Error { reason: e.to_string() }).await;
                        }
                    }
                }
            }
            Some(evt) = mpv_rx.recv() => {
                let Some(generation) = loads.accept(&evt) else {
                    debug!("mpv: dropping event from replaced file: {:?}", evt.event_name());
                    continue;
                };
                if let Some(be) = translator.translate(&evt) {
                    report(generation, be).await;
                }
            }
            _ = heartbeat.tick() => {
                if handle.is_some() && !driver.process_alive() {
                    warn!("mpv: heartbeat: process died");
                    handle = None;
                    translator.reset();
                    loads.settle();
                    if media_loaded {
                        media_loaded = false;
                        report(loads.current(), BackendEvent::Error { reason: "mpv exited".into() }).await;
                    }
                }
            }
        }
    }

    info!("mpv: backend task exiting");
    driver.kill().await;
}
