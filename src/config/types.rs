use std::path::{Path, PathBuf};
use std::time::Duration;

/// Country filters used when the override file does not provide any
pub const DEFAULT_COUNTRIES: &[&str] = &[
    "site:.ar", "site:.cl", "site:.co", "site:.pe", "site:.uy", "site:.bo", "site:.py",
    "site:.ve", "site:.ec",
];

/// Categories used when neither the override file nor the categories file provide any
pub const DEFAULT_CATEGORIES: &[&str] = &["universidad", "club de golf", "club deportivo", "empresa"];

pub const DEFAULT_MAX_QUERIES: usize = 36;
pub const DEFAULT_RESULTS_PER_QUERY: u32 = 20;

/// 0 means a domain already in the output is never processed again
pub const DEFAULT_TTL_DAYS: u32 = 0;

/// Fully resolved parameters of one crawl run
///
/// Built once at startup by [`RunConfig::merge`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Country filter tokens, e.g. `site:.ar`
    pub countries: Vec<String>,

    /// Category keyword phrases, e.g. `club de golf`
    pub categories: Vec<String>,

    /// Maximum number of queries dispatched; the generated list is truncated to it
    pub max_queries: usize,

    /// Number of results requested from the search provider per query (1-100)
    pub results_per_query: u32,

    /// Days before an already mined domain becomes eligible again
    pub requery_ttl_days: u32,

    /// Path of the CSV master file
    pub output_path: PathBuf,
}

impl RunConfig {
    /// Builds the default configuration for the given paths and categories
    pub fn defaults(paths: &Paths, categories: Vec<String>) -> Self {
        Self {
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            categories,
            max_queries: DEFAULT_MAX_QUERIES,
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
            requery_ttl_days: DEFAULT_TTL_DAYS,
            output_path: paths.default_output(),
        }
    }

    /// Applies overrides on top of `self`, returning a new configuration
    ///
    /// Fields absent from `overrides` keep the value from `self`. A relative
    /// output file name is resolved under `base_dir`.
    pub fn merge(&self, overrides: &ConfigOverrides, base_dir: &Path) -> Self {
        Self {
            countries: overrides
                .countries
                .clone()
                .unwrap_or_else(|| self.countries.clone()),
            categories: overrides
                .categories
                .clone()
                .unwrap_or_else(|| self.categories.clone()),
            max_queries: overrides.max_queries.unwrap_or(self.max_queries),
            results_per_query: overrides
                .results_per_query
                .unwrap_or(self.results_per_query),
            requery_ttl_days: overrides.requery_ttl_days.unwrap_or(self.requery_ttl_days),
            output_path: overrides
                .output_csv
                .as_ref()
                .map(|name| base_dir.join(name))
                .unwrap_or_else(|| self.output_path.clone()),
        }
    }
}

/// Optional values read from the JSON override file
///
/// Every field is `None` unless the key was present and well-formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub countries: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub max_queries: Option<usize>,
    pub results_per_query: Option<u32>,
    pub requery_ttl_days: Option<u32>,
    pub output_csv: Option<String>,
}

impl ConfigOverrides {
    /// Returns true if no key was overridden
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// File locations, all derived from one base directory
#[derive(Debug, Clone)]
pub struct Paths {
    pub base_dir: PathBuf,

    /// JSON override file written by the dashboard
    pub config_path: PathBuf,

    /// Optional JSON list of default categories
    pub default_categories_path: PathBuf,

    /// NDJSON audit trail
    pub audit_path: PathBuf,
}

impl Paths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            config_path: base_dir.join("crawler_config.json"),
            default_categories_path: base_dir.join("default_categories.json"),
            audit_path: base_dir.join("audits").join("latam_audit.ndjson"),
            base_dir,
        }
    }

    /// Replaces the override file location
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn default_output(&self) -> PathBuf {
        self.base_dir.join("latam_leads.csv")
    }
}

/// Runtime knobs that are not part of the dashboard's JSON file
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Timeout for a single page fetch
    pub fetch_timeout: Duration,

    /// Fixed pause between consecutive queries
    pub query_pause: Duration,

    /// Maximum number of pages fetched at the same time
    pub max_concurrent_fetches: usize,

    /// User-Agent sent to target sites
    pub user_agent: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(15),
            query_pause: Duration::from_secs(1),
            max_concurrent_fetches: 20,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}
