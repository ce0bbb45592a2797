//! Configuration module for the lead crawler
//!
//! This module resolves the run parameters from built-in defaults and the
//! optional JSON override file written by the dashboard. Loading never fails:
//! anything unreadable or malformed is reported and the default stands.
//!
//! # Example
//!
//! ```no_run
//! use latam_leads::config::{load_run_config, Paths};
//!
//! let paths = Paths::new(".");
//! let config = load_run_config(&paths);
//! println!("Up to {} queries will be dispatched", config.max_queries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ConfigOverrides, CrawlSettings, Paths, RunConfig};
pub use types::{
    DEFAULT_CATEGORIES, DEFAULT_COUNTRIES, DEFAULT_MAX_QUERIES, DEFAULT_RESULTS_PER_QUERY,
    DEFAULT_TTL_DAYS,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_default_categories, load_overrides, load_run_config,
    parse_overrides,
};
