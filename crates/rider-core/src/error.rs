//! Error types for rider-core.
//!
//! None of these ever cross the controller boundary: a failed lookup is folded
//! into `TransportState` by the controller.  They exist for the fetcher and
//! config layers, and for logging.

use thiserror::Error;

/// Why a metadata lookup produced no usable result.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The instance answered with a non-success status.
    #[error("lookup returned status {0}")]
    Status(u16),

    /// The body was not the JSON shape we expect.
    #[error("malformed metadata: {0}")]
    Malformed(String),

    /// No lookup instance is configured.
    #[error("no metadata instances configured")]
    NoInstances,

    /// The lookup succeeded but nothing in it can be played.
    #[error("no playable sources for {0}")]
    NoSources(String),
}

/// Problems reading or writing `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
