#![allow(dead_code)]

use rider_core::backend::{dispatch, MediaBackend};
use rider_core::controller::{Controller, Effect, Event};
use rider_core::fetch::FetchTicket;
use rider_core::protocol::{BackendEvent, Command};
use rider_core::session::DisplayInfo;
use rider_core::track::{StreamFormat, Thumbnail, TrackMetadata};
use rider_core::FetchError;

/// Calls the controller made on the media backend, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Stop,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
}

impl MediaBackend for RecordingBackend {
    fn load(&mut self, url: &str) {
        self.calls.push(Call::Load(url.to_string()));
    }
    fn play(&mut self) {
        self.calls.push(Call::Play);
    }
    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }
    fn seek(&mut self, fraction: f64) {
        self.calls.push(Call::Seek(fraction));
    }
    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }
}

impl RecordingBackend {
    pub fn loads(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Load(u) => Some(u.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Seek(f) => Some(*f),
                _ => None,
            })
            .collect()
    }
}

/// Controller plus a recording backend, with lookups held until the test
/// decides how they resolve.
#[derive(Default)]
pub struct Harness {
    pub controller: Controller,
    pub backend: RecordingBackend,
    pub pending: Vec<FetchTicket>,
}

impl Harness {
    pub fn send(&mut self, event: Event) {
        for effect in self.controller.handle(event) {
            if let Effect::Fetch(ticket) = &effect {
                self.pending.push(ticket.clone());
            }
            dispatch(&mut self.backend, &effect);
        }
    }

    pub fn ui(&mut self, cmd: Command) {
        self.send(Event::Ui(cmd));
    }

    /// Deliver `evt` as coming from the most recent load.
    pub fn backend_event(&mut self, evt: BackendEvent) {
        let generation = self.controller.output().generation;
        self.backend_event_from(generation, evt);
    }

    /// Deliver `evt` as coming from the load numbered `generation`.
    pub fn backend_event_from(&mut self, generation: u64, evt: BackendEvent) {
        self.send(Event::Backend {
            generation,
            event: evt,
        });
    }

    pub fn generation(&self) -> u64 {
        self.controller.output().generation
    }

    pub fn select(&mut self, id: &str, preview: DisplayInfo) {
        self.ui(Command::Select {
            id: id.to_string(),
            preview,
        });
    }

    /// Take the pending lookup for `id` (oldest first).
    pub fn ticket(&mut self, id: &str) -> FetchTicket {
        let pos = self
            .pending
            .iter()
            .position(|t| t.id == id)
            .unwrap_or_else(|| panic!("no pending lookup for {id}"));
        self.pending.remove(pos)
    }

    pub fn resolve(&mut self, id: &str, meta: TrackMetadata) {
        let ticket = self.ticket(id);
        self.send(Event::FetchCompleted {
            ticket,
            result: Ok(meta),
        });
    }

    pub fn reject(&mut self, id: &str) {
        let ticket = self.ticket(id);
        self.send(Event::FetchCompleted {
            ticket,
            result: Err(FetchError::Status(503)),
        });
    }

    pub fn progress(&mut self, played: f64, duration: f64) {
        self.backend_event(BackendEvent::Progress {
            played,
            played_seconds: played * duration,
            loaded: (played + 0.1).min(1.0),
            loaded_seconds: ((played + 0.1).min(1.0)) * duration,
        });
    }
}

pub fn preview(title: &str, thumb: &str) -> DisplayInfo {
    DisplayInfo {
        title: Some(title.to_string()),
        author: None,
        thumbnail_url: Some(thumb.to_string()),
    }
}

pub fn track(id: &str, stream: Option<&str>) -> TrackMetadata {
    TrackMetadata {
        video_id: id.to_string(),
        title: format!("Title {id}"),
        author: format!("Author {id}"),
        video_thumbnails: Vec::<Thumbnail>::new(),
        adaptive_formats: stream
            .map(|u| {
                vec![StreamFormat {
                    url: u.to_string(),
                    mime_type: Some("audio/webm".to_string()),
                }]
            })
            .unwrap_or_default(),
        ..Default::default()
    }
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}
