use crate::config::RunConfig;
use crate::state::DomainLedger;

/// Shared state of one crawl run
///
/// Owns the resolved configuration and the domain ledger. The coordinator
/// wraps it in an `Arc` and hands it to every fetch task.
#[derive(Debug)]
pub struct CrawlState {
    config: RunConfig,
    ledger: DomainLedger,
}

impl CrawlState {
    pub fn new(config: RunConfig) -> Self {
        let ledger = DomainLedger::new(config.requery_ttl_days);
        Self { config, ledger }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn ledger(&self) -> &DomainLedger {
        &self.ledger
    }
}
