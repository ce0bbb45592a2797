//! Crawler module for search-driven lead mining
//!
//! This module contains the core crawling logic, including:
//! - Query generation from countries and categories
//! - The search provider seam and its SerpAPI implementation
//! - Page fetching and contact extraction
//! - Overall crawl coordination and cancellation

mod coordinator;
mod extractor;
mod fetcher;
mod query;
mod search;
mod shutdown;

pub use coordinator::{run_crawl, Coordinator};
pub use extractor::{
    clean_emails, pick_best_email, Extraction, Extractor, RegexExtractor, EMAIL_AVOID,
    EMAIL_PREFER,
};
pub use fetcher::{build_http_client, fetch_page, FetchOutcome, PageFetcher, PageResult};
pub use query::{query_permutations, select_queries, Query};
pub use search::{search_or_empty, SearchClient, SearchError, SearchHit, SerpApiClient, API_KEY_ENV};
pub use shutdown::Shutdown;
