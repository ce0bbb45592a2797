//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Phase of the run state machine
//! - `DomainLedger`: Domains already mined and when, gating re-processing
//! - `CrawlState`: Resolved configuration plus ledger, shared across tasks

mod crawl_state;
mod ledger;
mod phase;

// Re-export main types
pub use crawl_state::CrawlState;
pub use ledger::{parse_last_seen, DomainLedger};
pub use phase::CrawlPhase;
