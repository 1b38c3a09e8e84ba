use serde::{Deserialize, Serialize};

use crate::session::DisplayInfo;

/// Actions coming from the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// The user clicked an item.  `preview` is whatever the originating view
    /// already knew about it (thumbnail, title, author).
    Select {
        id: String,
        #[serde(default)]
        preview: DisplayInfo,
    },
    TogglePlayPause,
    ScrubStart,
    ScrubMove { fraction: f64 },
    ScrubRelease { fraction: f64 },
}

/// Callbacks from the media backend, in the order it emits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BackendEvent {
    /// The loaded source can start rendering.
    Ready,
    Progress {
        played: f64,
        played_seconds: f64,
        loaded: f64,
        loaded_seconds: f64,
    },
    Buffer,
    BufferEnd,
    Duration { seconds: f64 },
    /// The backend paused on its own (media key, OS transport control).
    Paused,
    Ended,
    Error { reason: String },
}

/// Transport status of the current session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle, // nothing selected
    Loading,   // lookup in flight or source just handed to the backend
    Playing,   // backend is rendering
    Paused,    // user or backend paused
    Buffering, // waiting on the backend to fill its cache
    Error,     // lookup failed or every candidate source failed
}

/// Read-only projection of the controller consumed by the render layer on
/// every frame.  `rev` increases on every change, so clients can drop
/// duplicate pushes.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub rev: u64,
    pub selected_id: Option<String>,
    pub title: String,
    pub author: String,
    pub thumbnail_url: Option<String>,
    pub status: PlaybackStatus,
    pub buffering: bool,
    /// What the scrubber should show: the drag position while dragging,
    /// otherwise the last backend-reported fraction.
    pub position: f64,
    pub position_seconds: f64,
    pub loaded: f64,
    pub loaded_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub elapsed_label: String,
    pub duration_label: String,
    pub dragging: bool,
    /// Whether the play/pause button does anything right now.
    pub can_toggle: bool,
    /// Whether the backend's current media is paused.  While a new selection
    /// is loading this describes the previous track, which keeps playing.
    pub output_paused: bool,
    /// User-visible banner, if any.
    pub error: Option<String>,
}
