use crate::controller::Effect;
use crate::protocol::BackendEvent;

/// Imperative side of the media backend.  Every call is fire-and-forget: the
/// backend reports what actually happened through `BackendEvent`s.
pub trait MediaBackend: Send {
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    /// Seek to a fraction of the media length.
    fn seek(&mut self, fraction: f64);
    fn stop(&mut self);
}

/// Run a backend effect.  Returns `false` for effects the backend does not
/// handle (lookups), leaving those to the caller.
pub fn dispatch<B: MediaBackend + ?Sized>(backend: &mut B, effect: &Effect) -> bool {
    match effect {
        Effect::Load(url) => backend.load(url),
        Effect::Play => backend.play(),
        Effect::Pause => backend.pause(),
        Effect::Seek(fraction) => backend.seek(*fraction),
        Effect::Stop => backend.stop(),
        Effect::Fetch(_) => return false,
    }
    true
}

/// What the backend is doing with its current media, as far as the
/// controller can tell.  Independent of the session: while a new selection is
/// loading, this still describes the previous track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputState {
    /// Number of `Load`s issued so far.  Backend events carry the count of
    /// the load they belong to.
    pub generation: u64,
    pub loaded: bool,
    pub paused: bool,
}

impl OutputState {
    /// Record an effect on its way to the backend.
    pub fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::Load(_) => {
                self.generation += 1;
                self.loaded = true;
            }
            Effect::Play => self.paused = false,
            Effect::Pause => self.paused = true,
            Effect::Stop => {
                self.loaded = false;
                self.paused = false;
            }
            Effect::Seek(_) | Effect::Fetch(_) => {}
        }
    }

    /// Record what the backend reported about the current media.
    pub fn observe(&mut self, event: &BackendEvent) {
        match event {
            BackendEvent::Paused | BackendEvent::Ended => self.paused = true,
            BackendEvent::Error { .. } => self.loaded = false,
            _ => {}
        }
    }

    /// Media is loaded and not paused.
    pub fn audible(&self) -> bool {
        self.loaded && !self.paused
    }
}
