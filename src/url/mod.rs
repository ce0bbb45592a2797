//! URL handling module
//!
//! Domain-level deduplication keys leads by registrable domain, so every
//! candidate URL returned by the search provider goes through here first.

mod domain;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::registrable_domain;

/// Parses a URL string and returns its registrable domain
///
/// # Returns
///
/// * `Ok(String)` - The lowercase registrable domain
/// * `Err(UrlError::Parse)` - The string is not a valid absolute URL
/// * `Err(UrlError::MissingDomain)` - The URL has no host
pub fn domain_of(raw: &str) -> UrlResult<String> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;
    registrable_domain(&url).ok_or(UrlError::MissingDomain)
}

/// Returns the country code of a `site:.xx` filter token
///
/// Tokens in any other form are returned unchanged.
///
/// ```
/// use latam_leads::url::country_code;
///
/// assert_eq!(country_code("site:.ar"), "ar");
/// assert_eq!(country_code("mexico"), "mexico");
/// ```
pub fn country_code(filter: &str) -> &str {
    filter.strip_prefix("site:.").unwrap_or(filter)
}
