//! Track metadata as returned by an Invidious `/api/v1/videos/<id>` lookup.
//!
//! Only the fields the player reads are modelled; everything else in the
//! response is ignored.

use serde::{Deserialize, Serialize};

use crate::session::DisplayInfo;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Duration hint from the lookup.  The backend's own report wins once it
    /// arrives.
    #[serde(default)]
    pub length_seconds: Option<f64>,
    #[serde(default)]
    pub video_thumbnails: Vec<Thumbnail>,
    /// Adaptive (DASH) streams, best first.
    #[serde(default)]
    pub adaptive_formats: Vec<StreamFormat>,
    /// Progressive muxed streams.
    #[serde(default)]
    pub format_streams: Vec<StreamFormat>,
    /// Song annotations attached to music videos.
    #[serde(default)]
    pub music_tracks: Vec<MusicTrack>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicTrack {
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub artist: String,
}

impl TrackMetadata {
    pub fn adaptive_url(&self) -> Option<&str> {
        self.adaptive_formats.first().map(|f| f.url.as_str())
    }

    pub fn progressive_url(&self) -> Option<&str> {
        self.format_streams.first().map(|f| f.url.as_str())
    }

    pub fn first_thumbnail(&self) -> Option<&str> {
        self.video_thumbnails.first().map(|t| t.url.as_str())
    }

    /// First usable song annotation, if any.
    pub fn music_track(&self) -> Option<&MusicTrack> {
        self.music_tracks
            .first()
            .filter(|t| !t.song.trim().is_empty() || !t.artist.trim().is_empty())
    }

    /// Positive, finite duration hint.
    pub fn duration_hint(&self) -> Option<f64> {
        self.length_seconds.filter(|s| s.is_finite() && *s > 0.0)
    }

    /// The display fields this lookup knows about.  Empty strings count as
    /// unknown so they never overwrite a preview.
    pub fn display_info(&self) -> DisplayInfo {
        DisplayInfo {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            thumbnail_url: self.first_thumbnail().map(str::to_string),
        }
        .normalized()
    }
}
