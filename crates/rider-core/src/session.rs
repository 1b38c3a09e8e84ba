use serde::{Deserialize, Serialize};

use crate::track::{MusicTrack, TrackMetadata};

pub const NO_TITLE: &str = "No Title Playing";
pub const NO_AUTHOR: &str = "Author";

/// What the transport bar can show about an item.  Any field may be unknown,
/// e.g. before the lookup completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

fn known(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

impl DisplayInfo {
    /// Blank strings become `None`.
    pub fn normalized(self) -> Self {
        Self {
            title: known(self.title),
            author: known(self.author),
            thumbnail_url: known(self.thumbnail_url),
        }
    }

    /// Field-wise merge: a known field in `newer` replaces ours, an unknown
    /// one leaves ours in place.
    pub fn merged_with(self, newer: DisplayInfo) -> Self {
        let newer = newer.normalized();
        let ours = self.normalized();
        Self {
            title: newer.title.or(ours.title),
            author: newer.author.or(ours.author),
            thumbnail_url: newer.thumbnail_url.or(ours.thumbnail_url),
        }
    }
}

/// The one playback context: which item was chosen, what we know about it,
/// and which stream we are on.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub selected_id: String,
    pub display: DisplayInfo,
    pub music_track: Option<MusicTrack>,
    pub duration_hint: Option<f64>,
    /// Ordered, deduplicated.  Empty until the lookup resolves.
    pub candidate_sources: Vec<String>,
    /// `None` until a source has been handed to the backend.
    pub active_source_index: Option<usize>,
}

impl Session {
    /// Start a session for `id`.  Display fields the preview does not cover
    /// are carried over from `previous` so the bar never goes blank while the
    /// lookup is in flight.
    pub fn new(id: String, preview: DisplayInfo, previous: Option<&Session>) -> Self {
        let display = match previous {
            Some(prev) => prev.display.clone().merged_with(preview),
            None => preview.normalized(),
        };
        Self {
            selected_id: id,
            display,
            music_track: None,
            duration_hint: None,
            candidate_sources: Vec::new(),
            active_source_index: None,
        }
    }

    /// Fold a completed lookup into the session and point at the first source.
    pub fn attach(&mut self, meta: &TrackMetadata, sources: Vec<String>) {
        self.display = std::mem::take(&mut self.display).merged_with(meta.display_info());
        self.music_track = meta.music_track().cloned();
        self.duration_hint = meta.duration_hint();
        self.candidate_sources = sources;
        self.active_source_index = if self.candidate_sources.is_empty() {
            None
        } else {
            Some(0)
        };
    }

    pub fn active_source(&self) -> Option<&str> {
        self.active_source_index
            .and_then(|i| self.candidate_sources.get(i))
            .map(String::as_str)
    }

    /// True once a source for this session has been handed to the backend.
    pub fn has_loaded_source(&self) -> bool {
        self.active_source().is_some()
    }

    /// Song annotation, then lookup/preview title, then placeholder.
    pub fn title(&self) -> &str {
        self.music_track
            .as_ref()
            .map(|t| t.song.as_str())
            .filter(|s| !s.trim().is_empty())
            .or(self.display.title.as_deref())
            .unwrap_or(NO_TITLE)
    }

    pub fn author(&self) -> &str {
        self.music_track
            .as_ref()
            .map(|t| t.artist.as_str())
            .filter(|s| !s.trim().is_empty())
            .or(self.display.author.as_deref())
            .unwrap_or(NO_AUTHOR)
    }
}
