//! Search query generation
//!
//! Queries are the cartesian product of country filters and categories,
//! country-major, truncated to the configured maximum. Truncation is ordinal
//! so that identical configurations always dispatch the same queries.

use crate::url::country_code;
use std::fmt;

/// One search query and the pair it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Text sent to the search provider: `"<category> <country_filter>"`
    pub text: String,

    /// Country filter token, e.g. `site:.ar`
    pub country_filter: String,

    /// Full category phrase, e.g. `club de golf`
    pub category: String,
}

impl Query {
    pub fn new(category: &str, country_filter: &str) -> Self {
        Self {
            text: format!("{} {}", category, country_filter),
            country_filter: country_filter.to_string(),
            category: category.to_string(),
        }
    }

    /// Country code for the CSV `country` column (`site:.ar` -> `ar`)
    pub fn country(&self) -> &str {
        country_code(&self.country_filter)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds every `(country, category)` query, country varying slowest
pub fn query_permutations(countries: &[String], categories: &[String]) -> Vec<Query> {
    countries
        .iter()
        .flat_map(|country| {
            categories
                .iter()
                .map(move |category| Query::new(category, country))
        })
        .collect()
}

/// Keeps the first `max_queries` queries in generation order
pub fn select_queries(mut queries: Vec<Query>, max_queries: usize) -> Vec<Query> {
    queries.truncate(max_queries);
    queries
}
