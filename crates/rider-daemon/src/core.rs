/// PlayerCore: single-owner event loop around the session controller.
///
/// Every input (HTTP commands, mpv callbacks, finished lookups) arrives as a
/// `CoreEvent` on one mpsc channel and is applied to the `Controller` in
/// arrival order.  The effects it returns are executed here: backend effects
/// go straight to the `MediaBackend`, lookups are spawned as tasks whose
/// results come back through the same channel.
///
/// After each event the derived `Snapshot` is published to the
/// `SnapshotStore` and, when it changed, broadcast to SSE listeners.
use std::sync::Arc;

use rider_core::backend::{self, MediaBackend};
use rider_core::fetch::{FetchTicket, MetadataFetcher};
use rider_core::protocol::{BackendEvent, Command};
use rider_core::track::TrackMetadata;
use rider_core::{Controller, Effect, Event, FetchError, SnapshotStore};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::BroadcastMessage;

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from the HTTP API.
    Command(Command),
    /// A translated mpv callback, tagged with the number of loads mpv had
    /// executed when it was raised.
    Backend { generation: u64, event: BackendEvent },
    /// A metadata lookup finished, successfully or not.
    FetchCompleted {
        ticket: FetchTicket,
        result: Result<TrackMetadata, FetchError>,
    },
    /// Shutdown requested.
    Shutdown,
}

impl CoreEvent {
    /// The controller input this event carries, if any.
    fn into_controller_event(self) -> Option<Event> {
        match self {
            CoreEvent::Command(cmd) => Some(Event::Ui(cmd)),
            CoreEvent::Backend { generation, event } => {
                Some(Event::Backend { generation, event })
            }
            CoreEvent::FetchCompleted { ticket, result } => {
                Some(Event::FetchCompleted { ticket, result })
            }
            CoreEvent::Shutdown => None,
        }
    }
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore<F, B> {
    controller: Controller,
    fetcher: Arc<F>,
    backend: B,
    /// Clone handed to lookup tasks so their results re-enter the loop.
    event_tx: mpsc::Sender<CoreEvent>,
    store: SnapshotStore,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl<F, B> PlayerCore<F, B>
where
    F: MetadataFetcher,
    B: MediaBackend,
{
    pub fn new(
        controller: Controller,
        fetcher: F,
        backend: B,
        event_tx: mpsc::Sender<CoreEvent>,
        store: SnapshotStore,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) -> Self {
        Self {
            controller,
            fetcher: Arc::new(fetcher),
            backend,
            event_tx,
            store,
            broadcast_tx,
        }
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        self.publish().await;

        loop {
            let evt = match event_rx.recv().await {
                None => {
                    info!("PlayerCore: event channel closed, shutting down");
                    break;
                }
                Some(CoreEvent::Shutdown) => {
                    info!("PlayerCore: shutdown requested");
                    break;
                }
                Some(evt) => evt,
            };

            match &evt {
                CoreEvent::Command(cmd) => info!("PlayerCore: command {:?}", cmd),
                CoreEvent::Backend { generation, event } => {
                    debug!("PlayerCore: backend {:?} (load {})", event, generation)
                }
                CoreEvent::FetchCompleted { ticket, result } => debug!(
                    "PlayerCore: lookup {} (token {}) ok={}",
                    ticket.id,
                    ticket.token.0,
                    result.is_ok()
                ),
                CoreEvent::Shutdown => {}
            }

            if let Some(event) = evt.into_controller_event() {
                self.step(event);
                self.publish().await;
            }
        }

        self.backend.stop();
        Ok(())
    }

    /// Apply one event and execute the effects it produced.
    fn step(&mut self, event: Event) {
        for effect in self.controller.handle(event) {
            if backend::dispatch(&mut self.backend, &effect) {
                continue;
            }
            if let Effect::Fetch(ticket) = effect {
                self.spawn_fetch(ticket);
            }
        }
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        debug!("PlayerCore: looking up {}", ticket.id);
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_track(&ticket.id).await;
            if tx.send(CoreEvent::FetchCompleted { ticket, result }).await.is_err() {
                debug!("PlayerCore: loop gone, lookup result dropped");
            }
        });
    }

    async fn publish(&self) {
        if let Some(snapshot) = self.store.publish(self.controller.snapshot()).await {
            // No receivers is fine.
            let _ = self
                .broadcast_tx
                .send(BroadcastMessage::Snapshot(Arc::new(snapshot)));
        }
    }
}
