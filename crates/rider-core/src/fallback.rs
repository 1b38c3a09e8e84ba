use crate::session::Session;

/// Banner shown once every candidate source has failed.
pub const EXHAUSTED_MESSAGE: &str = "Cannot play this song, please try another";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackStep {
    /// Load this candidate next.
    Retry { index: usize, url: String },
    /// Nothing left to try.
    Exhausted,
}

/// Move the session to its next candidate after a playback error.
///
/// The index is left past the end on exhaustion so repeated errors keep
/// reporting `Exhausted` without wrapping around.
pub fn advance(session: &mut Session) -> FallbackStep {
    let next = session.active_source_index.map_or(0, |i| i + 1);
    match session.candidate_sources.get(next) {
        Some(url) => {
            session.active_source_index = Some(next);
            FallbackStep::Retry {
                index: next,
                url: url.clone(),
            }
        }
        None => {
            session.active_source_index = Some(session.candidate_sources.len());
            FallbackStep::Exhausted
        }
    }
}
