//! rider-core: the playback session controller behind the rider player.
//!
//! The controller is a reducer: [`controller::Controller::handle`] consumes one
//! [`controller::Event`] at a time and returns the [`controller::Effect`]s the
//! host must execute (fetch metadata, drive the media backend).  The
//! controller never spawns tasks or touches the media backend directly, so
//! every transition can be exercised without a runtime.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod invidious;
pub mod platform;
pub mod protocol;
pub mod resolver;
pub mod scrub;
pub mod session;
pub mod state;
pub mod timefmt;
pub mod track;
pub mod transport;

pub use controller::{Controller, Effect, Event};
pub use error::{ConfigError, FetchError};
pub use protocol::{BackendEvent, Command, Snapshot};
pub use state::SnapshotStore;
