use crate::track::TrackMetadata;

pub const DEFAULT_WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

/// Turns a lookup result into the ordered list of URLs worth trying.
///
/// Order: adaptive stream, progressive stream, canonical watch page.  The
/// watch page is always last and always present for a non-empty id; mpv plays
/// it through its yt-dlp hook.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    watch_base: String,
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_WATCH_BASE)
    }
}

impl SourceResolver {
    pub fn new(watch_base: impl Into<String>) -> Self {
        Self {
            watch_base: watch_base.into(),
        }
    }

    pub fn fallback_url(&self, id: &str) -> Option<String> {
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(format!("{}{}", self.watch_base, id))
        }
    }

    /// `id` is the selected identifier, not `meta.video_id`; some instances
    /// omit the latter.
    pub fn resolve(&self, meta: &TrackMetadata, id: &str) -> Vec<String> {
        let fallback = self.fallback_url(id);
        let candidates = [
            meta.adaptive_url().map(str::to_string),
            meta.progressive_url().map(str::to_string),
            fallback,
        ];

        let mut sources: Vec<String> = Vec::with_capacity(candidates.len());
        for url in candidates.into_iter().flatten() {
            let url = url.trim().to_string();
            if url.is_empty() || sources.contains(&url) {
                continue;
            }
            sources.push(url);
        }
        sources
    }
}
