//! Page fetching and per-URL lead mining
//!
//! This module handles:
//! - Building the HTTP client used for target sites
//! - GET requests with timeout and failure classification
//! - The per-URL pipeline: ledger check, fetch, extraction, audit, lead row

use crate::config::CrawlSettings;
use crate::crawler::extractor::{pick_best_email, Extraction, Extractor};
use crate::crawler::query::Query;
use crate::crawler::search::SearchHit;
use crate::output::{AuditEvent, AuditWriter, ExclusionFlag, HttpStatus, LeadRow};
use crate::state::CrawlState;
use crate::url::domain_of;
use chrono::{Local, SecondsFormat, Utc};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Raw result of one GET request
#[derive(Debug)]
pub struct FetchOutcome {
    pub status: HttpStatus,

    /// Response body, decoded lossily; `None` when the request failed
    pub body: Option<String>,

    pub duration_ms: u64,
}

/// What happened to one search result
#[derive(Debug)]
pub enum PageResult {
    /// The URL has no usable host
    Invalid,

    /// The domain was mined already (or is being fetched by a sibling task)
    Skipped,

    /// A fetch was attempted and audited
    Fetched {
        status: HttpStatus,
        lead: Option<LeadRow>,
    },
}

/// Builds the HTTP client used for target sites
///
/// Certificate validation is disabled: misconfigured certificates are common
/// on small sites and would otherwise hide their contact pages.
pub fn build_http_client(settings: &CrawlSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.fetch_timeout)
        .connect_timeout(settings.fetch_timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(settings.max_concurrent_fetches)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, classifying failures instead of returning them
///
/// | Condition | Status |
/// |-----------|--------|
/// | Any HTTP response | the numeric code (the body is kept) |
/// | Timeout | `Timeout` |
/// | Connection, TLS, body or other error | `Error` |
pub async fn fetch_page(client: &Client, url: &str) -> FetchOutcome {
    let start = Instant::now();

    let result = async {
        let response = client.get(url).send().await?;
        let code = response.status().as_u16();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((code, body))
    }
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((code, body)) => FetchOutcome {
            status: HttpStatus::Code(code),
            body: Some(body),
            duration_ms,
        },
        Err(e) if e.is_timeout() => {
            tracing::warn!("[WEB] Timeout fetching {}", url);
            FetchOutcome {
                status: HttpStatus::Timeout,
                body: None,
                duration_ms,
            }
        }
        Err(e) => {
            tracing::warn!("[WEB] Error fetching {}: {}", url, e);
            FetchOutcome {
                status: HttpStatus::Error,
                body: None,
                duration_ms,
            }
        }
    }
}

/// Fetches search results and turns them into audited lead rows
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    extractor: Arc<dyn Extractor>,
    audit: Arc<AuditWriter>,
    state: Arc<CrawlState>,
}

impl PageFetcher {
    pub fn new(
        client: Client,
        extractor: Arc<dyn Extractor>,
        audit: Arc<AuditWriter>,
        state: Arc<CrawlState>,
    ) -> Self {
        Self {
            client,
            extractor,
            audit,
            state,
        }
    }

    /// Mines one search result
    ///
    /// Every attempted fetch is audited, whatever its outcome. Ledger skips
    /// are not. The domain is marked processed only when at least one email
    /// was found, so pages without contacts stay eligible for later runs.
    ///
    /// # Errors
    ///
    /// Only audit write failures are returned; fetch failures are outcomes.
    pub async fn process(&self, hit: &SearchHit, query: &Query) -> crate::Result<PageResult> {
        let domain = match domain_of(&hit.url) {
            Ok(d) => d,
            Err(e) => {
                tracing::info!("[SKIP] Unusable result URL {}: {}", hit.url, e);
                return Ok(PageResult::Invalid);
            }
        };

        let ledger = self.state.ledger();
        if !ledger.should_process(&domain) {
            tracing::info!("[SKIP] Domain already processed recently: {}", domain);
            return Ok(PageResult::Skipped);
        }
        if !ledger.try_claim(&domain) {
            tracing::info!("[SKIP] Domain already being fetched: {}", domain);
            return Ok(PageResult::Skipped);
        }

        let outcome = fetch_page(&self.client, &hit.url).await;
        let Extraction { emails, phones } = outcome
            .body
            .as_deref()
            .map(|body| self.extractor.extract(body))
            .unwrap_or_default();
        let email_best = pick_best_email(&emails, &domain);
        let last_seen = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);

        let event = AuditEvent {
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            domain: domain.clone(),
            url: hit.url.clone(),
            http_status: outcome.status,
            duration_ms: outcome.duration_ms,
            emails_found: emails.clone(),
            email_best: email_best.clone(),
            phones_found: phones.clone(),
            priority: hit.rank,
            exclusion_flag: if outcome.status.is_failure() {
                ExclusionFlag::Excluded
            } else {
                ExclusionFlag::Included
            },
            last_seen: last_seen.clone(),
        };

        if let Err(e) = self.audit.append(&event) {
            ledger.release(&domain, false);
            return Err(e);
        }

        let found = !emails.is_empty();
        ledger.release(&domain, found);

        if !found {
            tracing::debug!("No emails on {} ({})", hit.url, outcome.status);
            return Ok(PageResult::Fetched {
                status: outcome.status,
                lead: None,
            });
        }

        tracing::debug!("{} emails on {}, best: {}", emails.len(), hit.url, email_best);

        Ok(PageResult::Fetched {
            status: outcome.status,
            lead: Some(LeadRow {
                query: query.text.clone(),
                country: query.country().to_string(),
                category: query.category.clone(),
                domain,
                homepage_url: hit.url.clone(),
                http_status: outcome.status,
                duration_ms: outcome.duration_ms,
                emails_all: emails,
                email_best,
                phones,
                priority: hit.rank,
                last_seen,
                email_sent: "No".to_string(),
            }),
        })
    }
}
