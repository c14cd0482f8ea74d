//! Refresh coalescing.

/// A refresh cycle to start now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    /// Failures of a silent cycle are logged, not shown.
    pub silent: bool,
}

/// Keeps at most one refresh cycle in flight.
///
/// Requests arriving while a cycle runs collapse into a single follow-up
/// cycle, which is loud if any of the collapsed requests was loud.
#[derive(Debug, Default)]
pub struct RefreshGate {
    in_flight: bool,
    pending: bool,
    pending_loud: bool,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Ask for a refresh. Returns a ticket when the cycle may start now.
    pub fn request(&mut self, silent: bool) -> Option<RefreshTicket> {
        if self.in_flight {
            self.pending = true;
            self.pending_loud |= !silent;
            return None;
        }
        self.in_flight = true;
        Some(RefreshTicket { silent })
    }

    /// The running cycle ended, successfully or not. Returns the follow-up
    /// cycle if requests piled up meanwhile.
    pub fn finish(&mut self) -> Option<RefreshTicket> {
        if !self.pending {
            self.in_flight = false;
            return None;
        }
        let ticket = RefreshTicket {
            silent: !self.pending_loud,
        };
        self.pending = false;
        self.pending_loud = false;
        Some(ticket)
    }
}
