//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives one run from start to finish:
//! - Resolving the configuration and seeding the domain ledger
//! - Dispatching queries in order, one at a time
//! - Fetching each query's results concurrently under a fixed cap
//! - Appending leads to the CSV and honoring cancellation

use crate::config::{load_run_config, CrawlSettings, Paths, RunConfig};
use crate::crawler::extractor::{Extractor, RegexExtractor};
use crate::crawler::fetcher::{build_http_client, PageFetcher, PageResult};
use crate::crawler::query::{query_permutations, select_queries, Query};
use crate::crawler::search::{search_or_empty, SearchClient};
use crate::crawler::shutdown::Shutdown;
use crate::output::{read_ledger_rows, AuditWriter, CsvSink, LeadRow, RunStatistics};
use crate::state::{CrawlPhase, CrawlState};
use crate::LeadError;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Main crawler coordinator structure
pub struct Coordinator {
    state: Arc<CrawlState>,
    search: Arc<dyn SearchClient>,
    fetcher: PageFetcher,
    sink: Option<CsvSink>,
    fetch_slots: Arc<Semaphore>,
    settings: CrawlSettings,
    shutdown: Shutdown,
    phase: CrawlPhase,
    stats: RunStatistics,
}

impl Coordinator {
    /// Creates a coordinator from the files under `paths`
    ///
    /// Resolves the run configuration (defaults, categories file, dashboard
    /// overrides) and then behaves like [`Coordinator::with_config`].
    pub fn from_paths(
        paths: &Paths,
        search: Arc<dyn SearchClient>,
        settings: CrawlSettings,
        shutdown: Shutdown,
    ) -> Result<Self, LeadError> {
        let mut phase = CrawlPhase::Idle;
        advance(&mut phase, CrawlPhase::LoadingConfig)?;
        let config = load_run_config(paths);
        Self::build(config, paths, search, Arc::new(RegexExtractor), settings, shutdown, phase)
    }

    /// Creates a coordinator for an already resolved configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `paths` - File locations (only the audit path is used)
    /// * `search` - Search provider
    /// * `extractor` - Contact extraction strategy
    /// * `settings` - Fetch timeout, pause, concurrency and User-Agent
    /// * `shutdown` - Cancellation signal shared with the caller
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ledger seeded and CSV opened
    /// * `Err(LeadError)` - The CSV could not be opened or the client built
    pub fn with_config(
        config: RunConfig,
        paths: &Paths,
        search: Arc<dyn SearchClient>,
        extractor: Arc<dyn Extractor>,
        settings: CrawlSettings,
        shutdown: Shutdown,
    ) -> Result<Self, LeadError> {
        let mut phase = CrawlPhase::Idle;
        advance(&mut phase, CrawlPhase::LoadingConfig)?;
        Self::build(config, paths, search, extractor, settings, shutdown, phase)
    }

    fn build(
        config: RunConfig,
        paths: &Paths,
        search: Arc<dyn SearchClient>,
        extractor: Arc<dyn Extractor>,
        settings: CrawlSettings,
        shutdown: Shutdown,
        phase: CrawlPhase,
    ) -> Result<Self, LeadError> {
        let state = Arc::new(CrawlState::new(config));

        // Seed the ledger before the sink gets a chance to rotate the file away
        let output_path = state.config().output_path.clone();
        match read_ledger_rows(&output_path) {
            Ok(rows) => {
                let count = state.ledger().preload(rows);
                tracing::info!("[DOMAINS] Preloaded {} domains", count);
            }
            Err(e) => {
                tracing::warn!(
                    "[DOMAINS] Could not read {}: {}; starting with an empty ledger",
                    output_path.display(),
                    e
                );
            }
        }

        let sink = CsvSink::open(&output_path)?;
        let client = build_http_client(&settings)?;
        let audit = Arc::new(AuditWriter::new(&paths.audit_path));
        let fetcher = PageFetcher::new(client, extractor, audit, state.clone());

        Ok(Self {
            state,
            search,
            fetcher,
            sink: Some(sink),
            fetch_slots: Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1))),
            settings,
            shutdown,
            phase,
            stats: RunStatistics::default(),
        })
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// The queries this run will dispatch, in order
    pub fn planned_queries(&self) -> Vec<Query> {
        let config = self.state.config();
        select_queries(
            query_permutations(&config.countries, &config.categories),
            config.max_queries,
        )
    }

    /// Runs the main crawl loop
    ///
    /// Queries are processed strictly one after another with a fixed pause in
    /// between. A failed search counts as zero results. Cancellation is
    /// checked before each query and interrupts the pause; fetches already
    /// started for the current query are allowed to finish and their rows are
    /// written.
    ///
    /// # Returns
    ///
    /// * `Ok(RunStatistics)` - The run reached `Done` or `Cancelled`
    /// * `Err(LeadError)` - An audit or CSV write failed
    pub async fn run(&mut self) -> Result<RunStatistics, LeadError> {
        self.transition(CrawlPhase::Querying)?;

        let queries = self.planned_queries();
        tracing::info!("[INFO] Dispatching {} queries", queries.len());

        let mut cancelled = false;
        for (i, query) in queries.iter().enumerate() {
            if self.shutdown.is_triggered() {
                cancelled = true;
                break;
            }

            if i > 0 && !self.pause().await {
                cancelled = true;
                break;
            }

            self.process_query(query).await?;
        }

        if cancelled {
            tracing::warn!("[INFO] Run cancelled; partial results kept");
            self.transition(CrawlPhase::Cancelled)?;
        } else {
            self.transition(CrawlPhase::Done)?;
        }

        self.finish()?;
        Ok(self.stats.clone())
    }

    /// Searches one query, fetches its results and appends the leads
    async fn process_query(&mut self, query: &Query) -> Result<(), LeadError> {
        self.transition(CrawlPhase::Searching)?;
        tracing::info!("[QUERY] Searching for: '{}'", query);

        let results_per_query = self.state.config().results_per_query;
        let hits = search_or_empty(self.search.as_ref(), &query.text, results_per_query).await;
        self.stats.queries_dispatched += 1;

        if hits.is_empty() {
            tracing::info!("[QUERY] No results for '{}'", query);
            self.stats.empty_queries += 1;
            return Ok(());
        }

        self.stats.urls_returned += hits.len();
        tracing::debug!("[QUERY] {} results for '{}'", hits.len(), query);

        self.transition(CrawlPhase::Fetching)?;
        let tasks = hits.iter().map(|hit| {
            let fetcher = self.fetcher.clone();
            let slots = self.fetch_slots.clone();
            async move {
                // The semaphore is never closed, so acquisition cannot fail
                let _permit = slots.acquire().await.ok();
                fetcher.process(hit, query).await
            }
        });
        let results = join_all(tasks).await;

        let mut leads: Vec<LeadRow> = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(PageResult::Invalid) | Ok(PageResult::Skipped) => {
                    self.stats.urls_skipped += 1;
                }
                Ok(PageResult::Fetched { status, lead }) => {
                    self.stats.fetches_attempted += 1;
                    if status.is_failure() {
                        self.stats.fetch_failures += 1;
                    }
                    leads.extend(lead);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        self.transition(CrawlPhase::Writing)?;
        if let Some(sink) = self.sink.as_mut() {
            for lead in &leads {
                sink.append(lead)?;
                tracing::info!("[LEAD] {} -> {}", lead.domain, lead.email_best);
            }
            sink.flush()?;
        }
        self.stats.leads_written += leads.len();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Waits the inter-query pause; returns false if cancelled meanwhile
    async fn pause(&self) -> bool {
        if self.settings.query_pause.is_zero() {
            return !self.shutdown.is_triggered();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.settings.query_pause) => true,
            _ = self.shutdown.wait() => false,
        }
    }

    fn finish(&mut self) -> Result<(), LeadError> {
        if let Some(sink) = self.sink.take() {
            let path = sink.path().to_path_buf();
            sink.close()?;
            tracing::info!("[INFO] Leads saved to {}", path.display());
        }
        self.stats.log_summary();
        tracing::info!("[INFO] Run finished: {}", self.phase);
        Ok(())
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), LeadError> {
        advance(&mut self.phase, next)
    }
}

fn advance(phase: &mut CrawlPhase, next: CrawlPhase) -> Result<(), LeadError> {
    if !phase.can_transition_to(next) {
        return Err(LeadError::InvalidTransition {
            from: *phase,
            to: next,
        });
    }
    tracing::debug!("Phase {} -> {}", phase, next);
    *phase = next;
    Ok(())
}

/// Runs a complete crawl
///
/// This is the entry point used by the binary. It will:
/// 1. Resolve the configuration under `paths`
/// 2. Seed the domain ledger from the existing CSV
/// 3. Open (or rotate) the CSV master file
/// 4. Dispatch every selected query and mine its results
/// 5. Log the run summary
///
/// # Arguments
///
/// * `paths` - File locations for this run
/// * `search` - Search provider
/// * `settings` - Runtime knobs
/// * `shutdown` - Cancellation signal, usually wired to Ctrl-C
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Counters for the finished (or cancelled) run
/// * `Err(LeadError)` - The run could not start or an output write failed
pub async fn run_crawl(
    paths: &Paths,
    search: Arc<dyn SearchClient>,
    settings: CrawlSettings,
    shutdown: Shutdown,
) -> Result<RunStatistics, LeadError> {
    let mut coordinator = Coordinator::from_paths(paths, search, settings, shutdown)?;
    coordinator.run().await
}
