//! LATAM Leads: a search-driven contact crawler
//!
//! This crate issues country- and category-scoped search queries, fetches the
//! result pages, extracts contact emails and phone numbers, deduplicates by
//! registrable domain and appends lead rows to a CSV master file, with an
//! NDJSON audit trail of every fetch attempt.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingApiKey(&'static str),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// None of these are fatal to a crawl: the loader reports them and falls back
/// to the built-in defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config root must be a JSON object")]
    NotAnObject,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, LeadError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlSettings, Paths, RunConfig};
pub use state::{CrawlPhase, CrawlState, DomainLedger};
pub use url::registrable_domain;
