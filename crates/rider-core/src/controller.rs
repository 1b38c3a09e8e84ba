/// Controller: the playback state machine.
///
/// One reducer owns the session, the transport state and the scrubber.  UI
/// commands, backend callbacks and lookup completions all arrive as [`Event`]s
/// and are processed strictly one at a time by [`Controller::handle`], which
/// returns the [`Effect`]s the host must carry out.  The controller never
/// talks to the network or the media backend itself.
///
/// Backend events only count once the current session has loaded a source.
/// Until then the previous track may still be audible (no hard cut while a
/// lookup is in flight), and anything it reports, errors included, belongs
/// to a session that no longer exists.  Every backend event also carries the
/// load generation it was raised under; events from an earlier load are
/// dropped.
use tracing::{debug, info, warn};

use crate::backend::OutputState;
use crate::error::FetchError;
use crate::fallback::{self, FallbackStep, EXHAUSTED_MESSAGE};
use crate::fetch::{FetchCoordinator, FetchTicket};
use crate::protocol::{BackendEvent, Command, PlaybackStatus, Snapshot};
use crate::resolver::SourceResolver;
use crate::scrub::DragState;
use crate::session::{DisplayInfo, Session, NO_AUTHOR, NO_TITLE};
use crate::timefmt;
use crate::track::TrackMetadata;
use crate::transport::TransportState;

/// Banner shown when the lookup itself fails.
pub const LOOKUP_FAILED_MESSAGE: &str = "Cannot load this song, please try another";

// ── Event / Effect ────────────────────────────────────────────────────────────

/// All inputs into the controller.
#[derive(Debug)]
pub enum Event {
    Ui(Command),
    /// A backend callback.  `generation` is the number of loads the backend
    /// had executed when the event was raised.
    Backend {
        generation: u64,
        event: BackendEvent,
    },
    FetchCompleted {
        ticket: FetchTicket,
        result: Result<TrackMetadata, FetchError>,
    },
}

/// Work the host performs on the controller's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a metadata lookup and feed the outcome back as `FetchCompleted`.
    Fetch(FetchTicket),
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Stop,
}

// ── Controller ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Controller {
    resolver: SourceResolver,
    fetches: FetchCoordinator,
    session: Option<Session>,
    transport: TransportState,
    drag: DragState,
    output: OutputState,
}

impl Controller {
    pub fn new(resolver: SourceResolver) -> Self {
        Self {
            resolver,
            ..Default::default()
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn fetches(&self) -> &FetchCoordinator {
        &self.fetches
    }

    pub fn output(&self) -> &OutputState {
        &self.output
    }

    /// Apply one event.  Never fails; every problem ends up in the transport
    /// state.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let before = self.transport.status;
        let mut effects = Vec::new();

        match event {
            Event::Ui(cmd) => self.on_command(cmd, &mut effects),
            Event::Backend { generation, event } => {
                self.on_backend(generation, event, &mut effects)
            }
            Event::FetchCompleted { ticket, result } => {
                self.on_fetch_completed(ticket, result, &mut effects)
            }
        }

        for effect in &effects {
            self.output.apply(effect);
        }

        if self.transport.status != before {
            info!(
                "Controller: status {:?} → {:?}",
                before, self.transport.status
            );
        }
        effects
    }

    // ── UI commands ───────────────────────────────────────────────────────────

    fn on_command(&mut self, cmd: Command, effects: &mut Vec<Effect>) {
        match cmd {
            Command::Select { id, preview } => self.select(id, preview, effects),
            Command::TogglePlayPause => self.toggle(effects),
            Command::ScrubStart => {
                if self.session.is_none() {
                    debug!("Controller: scrub start ignored, nothing selected");
                    return;
                }
                self.drag.begin(self.transport.position_fraction);
            }
            Command::ScrubMove { fraction } => {
                if self.session.is_none() {
                    return;
                }
                if !self.drag.active {
                    self.drag.begin(self.transport.position_fraction);
                }
                self.drag.update(fraction);
            }
            Command::ScrubRelease { fraction } => self.release_scrub(fraction, effects),
        }
    }

    fn select(&mut self, id: String, preview: DisplayInfo, effects: &mut Vec<Effect>) {
        let id = id.trim().to_string();
        if id.is_empty() {
            debug!("Controller: empty selection ignored");
            return;
        }
        if self.session.as_ref().map(|s| s.selected_id.as_str()) == Some(id.as_str()) {
            debug!("Controller: {} already selected", id);
            return;
        }

        // Whatever is playing keeps playing until the new lookup lands.
        let still_audible = self.output.audible();

        info!("Controller: select {}", id);
        self.session = Some(Session::new(id.clone(), preview, self.session.as_ref()));
        self.transport = TransportState::loading(!still_audible);
        self.drag.cancel();
        effects.push(Effect::Fetch(self.fetches.begin(&id)));
    }

    fn toggle(&mut self, effects: &mut Vec<Effect>) {
        let Some(session) = self.session.as_ref() else {
            debug!("Controller: toggle ignored, nothing selected");
            return;
        };
        let own_media = session.has_loaded_source();
        match self.transport.status {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => {
                self.transport.status = PlaybackStatus::Paused;
                effects.push(Effect::Pause);
            }
            PlaybackStatus::Loading if own_media => {
                self.transport.status = PlaybackStatus::Paused;
                effects.push(Effect::Pause);
            }
            PlaybackStatus::Paused => {
                if self.transport.ended {
                    // Replay from the top.
                    self.transport.ended = false;
                    effects.push(Effect::Seek(0.0));
                }
                self.transport.status = PlaybackStatus::Playing;
                effects.push(Effect::Play);
            }
            // The previous track is still loaded while this selection is
            // pending or its lookup failed.
            _ if self.output.loaded => {
                let effect = if self.output.paused {
                    Effect::Play
                } else {
                    Effect::Pause
                };
                debug!("Controller: toggling previous track ({:?})", effect);
                effects.push(effect);
            }
            other => debug!("Controller: toggle ignored while {:?}", other),
        }
    }

    fn release_scrub(&mut self, fraction: f64, effects: &mut Vec<Effect>) {
        let target = self.drag.release(fraction);
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !session.has_loaded_source() || self.transport.status == PlaybackStatus::Error {
            debug!("Controller: seek ignored, no media loaded");
            return;
        }
        if self.known_duration().is_none() {
            debug!("Controller: seek ignored, duration unknown");
            return;
        }
        self.transport.ended = false;
        effects.push(Effect::Seek(target));
    }

    // ── lookup completion ─────────────────────────────────────────────────────

    fn on_fetch_completed(
        &mut self,
        ticket: FetchTicket,
        result: Result<TrackMetadata, FetchError>,
        effects: &mut Vec<Effect>,
    ) {
        let selected = self.session.as_ref().map(|s| s.selected_id.as_str());
        if selected != Some(ticket.id.as_str()) || !self.fetches.settle(&ticket) {
            debug!(
                "Controller: discarding stale lookup for {} ({:?})",
                ticket.id, ticket.token
            );
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let meta = match result {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Controller: lookup for {} failed: {}", ticket.id, e);
                self.transport.fail(LOOKUP_FAILED_MESSAGE);
                return;
            }
        };

        let sources = self.resolver.resolve(&meta, &session.selected_id);
        session.attach(&meta, sources);
        let Some(url) = session.active_source().map(str::to_string) else {
            warn!(
                "Controller: lookup failed: {}",
                FetchError::NoSources(ticket.id)
            );
            self.transport.fail(LOOKUP_FAILED_MESSAGE);
            return;
        };

        info!(
            "Controller: {} resolved to {} candidate(s)",
            session.selected_id,
            session.candidate_sources.len()
        );
        self.transport.source_loading();
        self.transport.status = PlaybackStatus::Playing;
        self.transport.buffering = false;
        effects.push(Effect::Load(url));
        effects.push(Effect::Play);
    }

    // ── backend events ────────────────────────────────────────────────────────

    fn on_backend(&mut self, generation: u64, evt: BackendEvent, effects: &mut Vec<Effect>) {
        if generation != self.output.generation {
            debug!(
                "Controller: dropping event from load {} (current {}): {:?}",
                generation, self.output.generation, evt
            );
            return;
        }
        self.output.observe(&evt);

        let attributed = self
            .session
            .as_ref()
            .is_some_and(Session::has_loaded_source);
        if !attributed || self.transport.status == PlaybackStatus::Error {
            debug!("Controller: backend event not for this session: {:?}", evt);
            return;
        }

        let t = &mut self.transport;
        match evt {
            BackendEvent::Ready => {
                if !t.ready_seen {
                    t.ready_seen = true;
                    t.reset_progress();
                }
                t.buffering = false;
                t.ended = false;
                if t.status != PlaybackStatus::Paused {
                    t.status = PlaybackStatus::Playing;
                }
            }
            BackendEvent::Progress {
                played,
                played_seconds,
                loaded,
                loaded_seconds,
            } => t.record_progress(played, played_seconds, loaded, loaded_seconds),
            BackendEvent::Buffer => {
                t.buffering = true;
                if matches!(t.status, PlaybackStatus::Playing | PlaybackStatus::Loading) {
                    t.status = PlaybackStatus::Buffering;
                }
            }
            BackendEvent::BufferEnd => {
                t.buffering = false;
                if t.status == PlaybackStatus::Buffering {
                    t.status = PlaybackStatus::Playing;
                }
            }
            BackendEvent::Duration { seconds } => {
                if !t.set_duration(seconds) {
                    debug!("Controller: ignoring duration {}", seconds);
                }
            }
            BackendEvent::Paused => {
                if t.is_audible() {
                    t.status = PlaybackStatus::Paused;
                }
            }
            BackendEvent::Ended => {
                t.status = PlaybackStatus::Paused;
                t.ended = true;
                t.buffering = false;
                t.reset_progress();
            }
            BackendEvent::Error { reason } => self.on_source_error(&reason, effects),
        }
    }

    fn on_source_error(&mut self, reason: &str, effects: &mut Vec<Effect>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let failed = session.active_source().unwrap_or_default().to_string();
        match fallback::advance(session) {
            FallbackStep::Retry { index, url } => {
                warn!(
                    "Controller: source {} failed ({}), trying candidate {}: {}",
                    failed, reason, index, url
                );
                self.drag.cancel();
                self.transport.source_loading();
                self.transport.status = PlaybackStatus::Loading;
                self.transport.buffering = true;
                effects.push(Effect::Load(url));
                effects.push(Effect::Play);
            }
            FallbackStep::Exhausted => {
                warn!(
                    "Controller: source {} failed ({}), no candidates left for {}",
                    failed, reason, session.selected_id
                );
                self.drag.cancel();
                self.transport.reset_progress();
                self.transport.fail(EXHAUSTED_MESSAGE);
                effects.push(Effect::Stop);
            }
        }
    }

    // ── projection ────────────────────────────────────────────────────────────

    /// Backend-reported duration, else the lookup's hint.
    fn known_duration(&self) -> Option<f64> {
        self.transport
            .duration_seconds
            .or_else(|| self.session.as_ref().and_then(|s| s.duration_hint))
    }

    /// Read-only view for the render layer.  `rev` is left at zero; the host
    /// stamps it when publishing.
    pub fn snapshot(&self) -> Snapshot {
        let t = &self.transport;
        let duration = self.known_duration();
        Snapshot {
            rev: 0,
            selected_id: self.session.as_ref().map(|s| s.selected_id.clone()),
            title: self
                .session
                .as_ref()
                .map_or(NO_TITLE, Session::title)
                .to_string(),
            author: self
                .session
                .as_ref()
                .map_or(NO_AUTHOR, Session::author)
                .to_string(),
            thumbnail_url: self
                .session
                .as_ref()
                .and_then(|s| s.display.thumbnail_url.clone()),
            status: t.status,
            buffering: t.buffering,
            position: self.drag.displayed(t.position_fraction),
            position_seconds: t.position_seconds,
            loaded: t.loaded_fraction,
            loaded_seconds: t.loaded_seconds,
            duration_seconds: duration,
            elapsed_label: timefmt::clock(t.position_seconds),
            duration_label: timefmt::duration_label(duration),
            dragging: self.drag.active,
            can_toggle: self.session.is_some()
                && (self.output.loaded
                    || matches!(
                        t.status,
                        PlaybackStatus::Playing
                            | PlaybackStatus::Paused
                            | PlaybackStatus::Buffering
                    )),
            output_paused: self.output.loaded && self.output.paused,
            error: t.error.clone(),
        }
    }
}
