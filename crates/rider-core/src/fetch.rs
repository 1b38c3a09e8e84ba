//! Fetch coordination.
//!
//! Every accepted selection advances a monotonic [`SelectionToken`].  The
//! lookup it starts is described by a [`FetchTicket`]; when the lookup comes
//! back, the ticket is checked against the coordinator and a superseded
//! result is simply dropped.  Nothing is ever cancelled.

use std::future::Future;

use crate::error::FetchError;
use crate::track::TrackMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SelectionToken(pub u64);

/// Identifies one lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub token: SelectionToken,
    pub id: String,
}

/// Tracks which lookup, if any, is still allowed to land.
#[derive(Debug, Default)]
pub struct FetchCoordinator {
    current: SelectionToken,
    in_flight: Option<FetchTicket>,
}

impl FetchCoordinator {
    /// Start a lookup for `id`, superseding whatever was in flight.
    pub fn begin(&mut self, id: &str) -> FetchTicket {
        self.current = SelectionToken(self.current.0 + 1);
        let ticket = FetchTicket {
            token: self.current,
            id: id.to_string(),
        };
        self.in_flight = Some(ticket.clone());
        ticket
    }

    pub fn current(&self) -> SelectionToken {
        self.current
    }

    pub fn in_flight(&self) -> Option<&FetchTicket> {
        self.in_flight.as_ref()
    }

    /// Claim the right to apply `ticket`'s result.  Returns `true` exactly
    /// once, and only for the latest request.
    pub fn settle(&mut self, ticket: &FetchTicket) -> bool {
        match &self.in_flight {
            Some(pending) if pending == ticket => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }
}

/// Source of track metadata and stream URLs.
pub trait MetadataFetcher: Send + Sync + 'static {
    fn fetch_track(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<TrackMetadata, FetchError>> + Send;
}
