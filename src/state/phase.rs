/// Crawl phase definitions for the run state machine
///
/// `Idle -> LoadingConfig -> Querying -> (Searching -> Fetching -> Writing)* -> Done`,
/// with `Cancelled` reachable from every in-flight phase.
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing started yet
    Idle,

    /// Resolving the run configuration and opening outputs
    LoadingConfig,

    /// Queries generated, about to dispatch the first one
    Querying,

    // ===== Per-query phases =====
    /// Waiting on the search provider
    Searching,

    /// Fetching the result pages of the current query
    Fetching,

    /// Appending the current query's leads to the CSV
    Writing,

    // ===== Terminal phases =====
    /// All selected queries were processed
    Done,

    /// Stopped by an external interrupt
    Cancelled,
}

impl CrawlPhase {
    /// Returns true if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Returns true if the run has started and not yet finished
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal() && *self != Self::Idle
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;

        if next == Cancelled {
            return self.is_in_flight();
        }

        matches!(
            (self, next),
            (Idle, LoadingConfig)
                | (LoadingConfig, Querying)
                | (Querying, Searching)
                | (Querying, Done)
                // An empty or failed search moves straight to the next query
                | (Searching, Searching)
                | (Searching, Fetching)
                | (Searching, Done)
                | (Fetching, Writing)
                | (Writing, Searching)
                | (Writing, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingConfig => "loading_config",
            Self::Querying => "querying",
            Self::Searching => "searching",
            Self::Fetching => "fetching",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
