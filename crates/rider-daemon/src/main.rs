mod core;
mod http;
mod mpv;

use std::sync::Arc;

use rider_core::config::Config;
use rider_core::invidious::InvidiousFetcher;
use rider_core::protocol::Snapshot;
use rider_core::resolver::SourceResolver;
use rider_core::{Controller, SnapshotStore};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// A new snapshot was published (rev already bumped).
    Snapshot(Arc<Snapshot>),
    Log(String),
}

/// A custom tracing layer that forwards log messages to the broadcast channel
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        // SSE clients only get WARN and ERROR
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup broadcast channel first so we can use it for logging
    let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(100);

    // Logging is not up yet, so a bad config file is reported after init.
    let (config, config_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_path = config.paths.log_file.clone();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);
    match config_err {
        None => info!("Config loaded from: {:?}", Config::config_path()),
        Some(e) => warn!("Config unreadable ({}), using defaults", e),
    }

    // Event channel: all external inputs funnel into PlayerCore
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(256);
    let store = SnapshotStore::new();

    let (backend, _backend_task) =
        mpv::MpvBackend::spawn(mpv::MpvDriver::new(&config.player), event_tx.clone());
    let fetcher = InvidiousFetcher::new(&config.fetch)?;
    let controller = Controller::new(SourceResolver::new(config.fetch.watch_base_url.clone()));

    let player_core = core::PlayerCore::new(
        controller,
        fetcher,
        backend,
        event_tx.clone(),
        store.clone(),
        broadcast_tx.clone(),
    );

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            store.clone(),
            event_tx.clone(),
            broadcast_tx.clone(),
        );
    }

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = shutdown_tx.send(core::CoreEvent::Shutdown).await;
        }
    });
    drop(event_tx);

    info!("rider initialised, running event loop");
    player_core.run(event_rx).await?;

    Ok(())
}
