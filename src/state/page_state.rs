/// Page state definitions for tracking crawl progress
///
/// This module defines the states a URI can be in once the frontier has
/// accepted it.
use std::fmt;

/// Represents where a URI currently sits in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// URI is queued and waiting to be submitted
    Pending,

    /// URI has been submitted to the fetch pool and has not completed yet
    InFlight,

    // ===== Terminal States =====
    /// URI was fetched (or checked) successfully
    Discovered,

    /// URI fetch failed
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Discovered | Self::Failed)
    }

    /// Returns true if the URI still counts as "to load"
    ///
    /// In-flight URIs are part of the pending set: a suspend puts them back
    /// in the queue.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending | Self::InFlight)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Discovered)
    }

    /// Stable lowercase name, used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Discovered => "discovered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
