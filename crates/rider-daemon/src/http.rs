use crate::core::CoreEvent;
use crate::BroadcastMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
    routing::{get, post},
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use rider_core::protocol::{Command, Snapshot};
use rider_core::session::DisplayInfo;
use rider_core::SnapshotStore;
use serde::Deserialize;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

#[derive(Clone)]
struct HttpState {
    store: SnapshotStore,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FractionBody {
    fraction: f64,
}

impl FractionBody {
    fn validated(&self) -> Option<f64> {
        (self.fraction.is_finite() && (0.0..=1.0).contains(&self.fraction))
            .then_some(self.fraction)
    }
}

fn router(
    store: SnapshotStore,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> Router {
    let app_state = HttpState {
        store,
        event_tx,
        broadcast_tx,
    };

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/events", get(events))
        .route("/api/select", post(select))
        .route("/api/toggle", post(toggle))
        .route("/api/scrub/start", post(scrub_start))
        .route("/api/scrub/move", post(scrub_move))
        .route("/api/scrub/release", post(scrub_release))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    store: SnapshotStore,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(store, event_tx, broadcast_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn forward(state: &HttpState, cmd: Command) -> StatusCode {
    if state.event_tx.send(CoreEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: core loop gone, command dropped");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn get_state(State(state): State<HttpState>) -> Json<Snapshot> {
    Json(state.store.get().await)
}

fn snapshot_event(snapshot: &Snapshot) -> SseEvent {
    SseEvent::default()
        .event("snapshot")
        .json_data(snapshot)
        .unwrap_or_else(|e| SseEvent::default().event("error").data(e.to_string()))
}

/// Server-sent events: the current snapshot first, then every change and
/// forwarded WARN/ERROR log lines.
async fn events(
    State(state): State<HttpState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.broadcast_tx.subscribe();
    let initial = snapshot_event(&state.store.get().await);

    let updates = stream::unfold((rx, state.store), |(mut rx, store)| async move {
        let evt = match rx.recv().await {
            Ok(BroadcastMessage::Snapshot(snapshot)) => snapshot_event(&snapshot),
            Ok(BroadcastMessage::Log(line)) => SseEvent::default().event("log").data(line),
            Err(RecvError::Lagged(skipped)) => {
                // Missed updates collapse into the latest state.
                debug!("HTTP API: SSE client lagged by {}", skipped);
                snapshot_event(&store.get().await)
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(evt), (rx, store)))
    });

    let stream = stream::once(async move { Ok(initial) }).chain(updates);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn select(State(state): State<HttpState>, Json(body): Json<SelectBody>) -> StatusCode {
    let id = body.id.trim();
    if id.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    info!("HTTP API: Select {}", id);
    let cmd = Command::Select {
        id: id.to_string(),
        preview: DisplayInfo {
            title: body.title,
            author: body.author,
            thumbnail_url: body.thumbnail_url,
        },
    };
    forward(&state, cmd).await
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::TogglePlayPause).await
}

async fn scrub_start(State(state): State<HttpState>) -> StatusCode {
    forward(&state, Command::ScrubStart).await
}

async fn scrub_move(State(state): State<HttpState>, Json(body): Json<FractionBody>) -> StatusCode {
    match body.validated() {
        Some(fraction) => forward(&state, Command::ScrubMove { fraction }).await,
        None => StatusCode::BAD_REQUEST,
    }
}

async fn scrub_release(
    State(state): State<HttpState>,
    Json(body): Json<FractionBody>,
) -> StatusCode {
    match body.validated() {
        Some(fraction) => forward(&state, Command::ScrubRelease { fraction }).await,
        None => StatusCode::BAD_REQUEST,
    }
}
