//! Scrubber reconciliation.
//!
//! The control shows backend truth except while the user holds it.  Moves
//! only touch `pending_fraction`; the single seek happens on release.

use crate::transport::unit;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragState {
    pub active: bool,
    pub pending_fraction: f64,
}

impl DragState {
    /// Grab the control where it currently is so it does not jump.
    pub fn begin(&mut self, current: f64) {
        self.active = true;
        self.pending_fraction = unit(current);
    }

    pub fn update(&mut self, fraction: f64) {
        self.pending_fraction = unit(fraction);
    }

    /// Let go at `fraction`; returns the seek target.
    pub fn release(&mut self, fraction: f64) -> f64 {
        self.pending_fraction = unit(fraction);
        self.active = false;
        self.pending_fraction
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Value the position control should render.
    pub fn displayed(&self, backend_fraction: f64) -> f64 {
        if self.active {
            self.pending_fraction
        } else {
            backend_fraction
        }
    }
}
