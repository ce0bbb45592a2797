//! Integration tests for the crawler
//!
//! These tests use wiremock for the target pages and an in-process search
//! client, and drive full runs through the coordinator.

use async_trait::async_trait;
use latam_leads::config::{CrawlSettings, Paths, RunConfig};
use latam_leads::crawler::{
    Coordinator, RegexExtractor, SearchClient, SearchError, SearchHit, Shutdown,
};
use latam_leads::output::{read_existing_header, read_tail, ExclusionFlag, HttpStatus, FIELDNAMES};
use latam_leads::CrawlPhase;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Search client returning the same hits for every query and recording the queries
struct FixedSearch {
    hits: Vec<SearchHit>,
    fail: bool,
    seen: Arc<Mutex<Vec<String>>>,
    /// Triggered from inside the first search, as if Ctrl-C arrived mid-query
    cancel_on_search: Option<Shutdown>,
}

impl FixedSearch {
    fn new(urls: &[String]) -> Self {
        Self {
            hits: urls
                .iter()
                .enumerate()
                .map(|(i, url)| SearchHit {
                    url: url.clone(),
                    rank: i as u32 + 1,
                })
                .collect(),
            fail: false,
            seen: Arc::new(Mutex::new(Vec::new())),
            cancel_on_search: None,
        }
    }

    fn cancelling(urls: &[String], shutdown: Shutdown) -> Self {
        Self {
            cancel_on_search: Some(shutdown),
            ..Self::new(urls)
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }
}

#[async_trait]
impl SearchClient for FixedSearch {
    async fn search(&self, query: &str, _result_count: u32) -> Result<Vec<SearchHit>, SearchError> {
        self.seen.lock().unwrap().push(query.to_string());
        if let Some(shutdown) = &self.cancel_on_search {
            shutdown.trigger();
        }
        if self.fail {
            return Err(SearchError::Provider("quota exceeded".to_string()));
        }
        Ok(self.hits.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn test_settings() -> CrawlSettings {
    CrawlSettings {
        fetch_timeout: Duration::from_millis(500),
        query_pause: Duration::ZERO,
        ..CrawlSettings::default()
    }
}

fn test_config(paths: &Paths, countries: &[&str], max_queries: usize) -> RunConfig {
    let mut config = RunConfig::defaults(
        paths,
        vec!["universidad".to_string(), "club de golf".to_string()],
    );
    config.countries = countries.iter().map(|c| c.to_string()).collect();
    config.max_queries = max_queries;
    config
}

fn coordinator(
    paths: &Paths,
    config: RunConfig,
    search: Arc<dyn SearchClient>,
    shutdown: Shutdown,
) -> Coordinator {
    coordinator_with_settings(paths, config, search, shutdown, test_settings())
}

fn coordinator_with_settings(
    paths: &Paths,
    config: RunConfig,
    search: Arc<dyn SearchClient>,
    shutdown: Shutdown,
    settings: CrawlSettings,
) -> Coordinator {
    Coordinator::with_config(
        config,
        paths,
        search,
        Arc::new(RegexExtractor),
        settings,
        shutdown,
    )
    .expect("coordinator should start")
}

fn read_rows(paths: &Paths) -> Vec<csv::StringRecord> {
    let bytes = std::fs::read(paths.default_output()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    reader.records().map(|r| r.unwrap()).collect()
}

#[tokio::test]
async fn test_page_without_emails_is_audited_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Bienvenidos</h1>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let search = Arc::new(FixedSearch::new(&[format!("{}/", server.uri())]));
    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.ar"], 1),
        search,
        Shutdown::new(),
    );

    let stats = coordinator.run().await.unwrap();

    assert_eq!(coordinator.phase(), CrawlPhase::Done);
    assert_eq!(stats.fetches_attempted, 1);
    assert_eq!(stats.leads_written, 0);
    assert!(read_rows(&paths).is_empty());
    assert!(coordinator.state().ledger().should_process("127.0.0.1"));

    let events = read_tail(&paths.audit_path, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].emails_found.is_empty());
    assert_eq!(events[0].http_status, HttpStatus::Code(200));
}

#[tokio::test]
async fn test_lead_written_once_across_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<p>Escribinos a info@golfclub.com.ar o noreply@golfclub.com.ar</p>\
             <p>Tel: +54 11 4510-1100</p>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let url = format!("{}/contacto", server.uri());

    // Two queries return the same URL; the second is skipped by the ledger
    let first = {
        let mut coordinator = coordinator(
            &paths,
            test_config(&paths, &["site:.ar"], 2),
            Arc::new(FixedSearch::new(&[url.clone()])),
            Shutdown::new(),
        );
        coordinator.run().await.unwrap()
    };
    assert_eq!(first.leads_written, 1);
    assert_eq!(first.urls_skipped, 1);

    // A new run seeds the ledger from the CSV and never refetches
    let second = {
        let mut coordinator = coordinator(
            &paths,
            test_config(&paths, &["site:.ar"], 2),
            Arc::new(FixedSearch::new(&[url.clone()])),
            Shutdown::new(),
        );
        assert_eq!(coordinator.state().ledger().len(), 1);
        coordinator.run().await.unwrap()
    };
    assert_eq!(second.leads_written, 0);
    assert_eq!(second.fetches_attempted, 0);

    let rows = read_rows(&paths);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(&row[0], "universidad site:.ar");
    assert_eq!(&row[1], "ar");
    assert_eq!(&row[2], "universidad");
    assert_eq!(&row[3], "127.0.0.1");
    assert_eq!(&row[4], url.as_str());
    assert_eq!(&row[5], "200");
    assert_eq!(&row[8], "info@golfclub.com.ar");
    assert_eq!(&row[9], "+54 11 4510-1100");
    assert_eq!(&row[10], "1");
    assert_eq!(&row[12], "No");

    assert_eq!(read_tail(&paths.audit_path, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_queries_truncated_in_generation_order() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let search = Arc::new(FixedSearch::new(&[]));
    let seen = search.seen.clone();

    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.ar", "site:.cl"], 3),
        search,
        Shutdown::new(),
    );
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.queries_dispatched, 3);
    assert_eq!(stats.empty_queries, 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "universidad site:.ar",
            "club de golf site:.ar",
            "universidad site:.cl",
        ]
    );
}

#[tokio::test]
async fn test_search_failure_counts_as_empty() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());

    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.pe"], 2),
        Arc::new(FixedSearch::failing()),
        Shutdown::new(),
    );
    let stats = coordinator.run().await.unwrap();

    assert_eq!(coordinator.phase(), CrawlPhase::Done);
    assert_eq!(stats.queries_dispatched, 2);
    assert_eq!(stats.empty_queries, 2);
    assert!(!paths.audit_path.exists());
}

#[tokio::test]
async fn test_cancelled_before_first_query() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let search = Arc::new(FixedSearch::new(&[]));
    let seen = search.seen.clone();

    let shutdown = Shutdown::new();
    shutdown.trigger();

    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.ar"], 2),
        search,
        shutdown,
    );
    let stats = coordinator.run().await.unwrap();

    assert_eq!(coordinator.phase(), CrawlPhase::Cancelled);
    assert_eq!(stats.queries_dispatched, 0);
    assert!(seen.lock().unwrap().is_empty());

    let header = read_existing_header(&paths.default_output()).unwrap().unwrap();
    assert_eq!(header, FIELDNAMES);
}

#[tokio::test]
async fn test_timeout_recorded_as_excluded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("info@lento.com.bo")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.bo"], 1),
        Arc::new(FixedSearch::new(&[format!("{}/", server.uri())])),
        Shutdown::new(),
    );
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.leads_written, 0);

    let events = read_tail(&paths.audit_path, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].http_status, HttpStatus::Timeout);
    assert_eq!(events[0].exclusion_flag, ExclusionFlag::Excluded);
}

#[tokio::test]
async fn test_old_schema_file_is_rotated() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    std::fs::write(
        paths.default_output(),
        "\u{feff}query,domain,email\nuniversidad site:.ar,uba.ar,info@uba.ar\n",
    )
    .unwrap();

    let coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.ar"], 1),
        Arc::new(FixedSearch::new(&[])),
        Shutdown::new(),
    );

    // Old rows still seed the ledger before the file is rotated away
    assert!(!coordinator.state().ledger().should_process("uba.ar"));

    let rotated: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("latam_leads_OLD_"))
        .collect();
    assert_eq!(rotated.len(), 1);

    let header = read_existing_header(&paths.default_output()).unwrap().unwrap();
    assert_eq!(header, FIELDNAMES);
}

#[tokio::test]
async fn test_cancel_during_query_drains_and_writes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacto"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>contacto@clubdeportivo.com.pe</p>")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let shutdown = Shutdown::new();
    let search = Arc::new(FixedSearch::cancelling(
        &[format!("{}/contacto", server.uri())],
        shutdown.clone(),
    ));
    let seen = search.seen.clone();

    let mut coordinator = coordinator(
        &paths,
        test_config(&paths, &["site:.pe", "site:.ec"], 4),
        search,
        shutdown,
    );
    let stats = coordinator.run().await.unwrap();

    // The interrupted query finishes; no later query reaches the provider
    assert_eq!(coordinator.phase(), CrawlPhase::Cancelled);
    assert_eq!(*seen.lock().unwrap(), vec!["universidad site:.pe"]);
    assert_eq!(stats.queries_dispatched, 1);
    assert_eq!(stats.leads_written, 1);

    let rows = read_rows(&paths);
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][8], "contacto@clubdeportivo.com.pe");
    assert_eq!(read_tail(&paths.audit_path, 10).unwrap().len(), 1);
}

/// Two result pages on distinct hosts of the same server, each answering after `delay`
async fn two_slow_pages(server: &MockServer, delay: Duration) -> Vec<String> {
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>Sin contactos</p>")
                .set_delay(delay),
        )
        .expect(2)
        .mount(server)
        .await;

    let port = server.address().port();
    vec![
        format!("http://127.0.0.1:{}/a", port),
        format!("http://localhost:{}/b", port),
    ]
}

async fn timed_run(max_concurrent_fetches: usize, urls: &[String]) -> (Duration, usize) {
    let dir = TempDir::new().unwrap();
    let paths = Paths::new(dir.path());
    let settings = CrawlSettings {
        max_concurrent_fetches,
        fetch_timeout: Duration::from_secs(10),
        ..test_settings()
    };
    let mut coordinator = coordinator_with_settings(
        &paths,
        test_config(&paths, &["site:.uy"], 1),
        Arc::new(FixedSearch::new(urls)),
        Shutdown::new(),
        settings,
    );

    let start = Instant::now();
    let stats = coordinator.run().await.unwrap();
    (start.elapsed(), stats.fetches_attempted)
}

#[tokio::test]
async fn test_fetch_cap_of_one_serializes_fetches() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(500);
    let urls = two_slow_pages(&server, delay).await;

    let (elapsed, fetched) = timed_run(1, &urls).await;

    assert_eq!(fetched, 2);
    assert!(elapsed >= delay * 2, "fetches overlapped: {:?}", elapsed);
}

#[tokio::test]
async fn test_fetches_within_a_query_overlap_up_to_the_cap() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(500);
    let urls = two_slow_pages(&server, delay).await;

    let (elapsed, fetched) = timed_run(2, &urls).await;

    assert_eq!(fetched, 2);
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "fetches did not overlap: {:?}", elapsed);
}
