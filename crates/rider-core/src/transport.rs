use crate::protocol::PlaybackStatus;

/// Transport state owned by the controller.  Reset whenever the session is
/// replaced.
///
/// `position_fraction` is always the last value the backend reported; drag
/// overrides are applied at projection time (see `scrub`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportState {
    pub status: PlaybackStatus,
    /// Independent of `status`; a paused stream can still be filling its cache.
    pub buffering: bool,
    pub position_fraction: f64,
    pub position_seconds: f64,
    pub loaded_fraction: f64,
    pub loaded_seconds: f64,
    /// Unknown until the backend reports it.
    pub duration_seconds: Option<f64>,
    /// Set once the current source has reported ready; cleared on every load.
    pub ready_seen: bool,
    /// The source played to its end; the next play starts from the top.
    pub ended: bool,
    /// User-visible banner.
    pub error: Option<String>,
}

pub(crate) fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

impl TransportState {
    /// Fresh state for a new selection.  `buffering` is false when something
    /// is still audible from the previous session.
    pub fn loading(buffering: bool) -> Self {
        Self {
            status: PlaybackStatus::Loading,
            buffering,
            ..Default::default()
        }
    }

    pub fn reset_progress(&mut self) {
        self.position_fraction = 0.0;
        self.position_seconds = 0.0;
        self.loaded_fraction = 0.0;
        self.loaded_seconds = 0.0;
    }

    /// A new source is being handed to the backend.
    pub fn source_loading(&mut self) {
        self.reset_progress();
        self.ready_seen = false;
        self.ended = false;
        self.duration_seconds = None;
    }

    pub fn record_progress(
        &mut self,
        played: f64,
        played_seconds: f64,
        loaded: f64,
        loaded_seconds: f64,
    ) {
        self.position_fraction = unit(played);
        self.position_seconds = non_negative(played_seconds);
        self.loaded_fraction = unit(loaded);
        self.loaded_seconds = non_negative(loaded_seconds);
    }

    /// Ignores zero, negative, and non-finite values (live streams report 0).
    pub fn set_duration(&mut self, seconds: f64) -> bool {
        if seconds.is_finite() && seconds > 0.0 {
            self.duration_seconds = Some(seconds);
            true
        } else {
            false
        }
    }

    /// True while the backend is, or is about to be, producing sound.
    pub fn is_audible(&self) -> bool {
        matches!(
            self.status,
            PlaybackStatus::Playing | PlaybackStatus::Buffering
        )
    }

    pub fn fail(&mut self, message: &str) {
        self.status = PlaybackStatus::Error;
        self.buffering = false;
        self.error = Some(message.to_string());
    }
}
