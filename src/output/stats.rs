//! Run statistics and reporting
//!
//! Counters collected by the coordinator during a run, plus the summary shown
//! by `--stats` from the files a previous run left behind.

use crate::output::audit::{read_tail, AuditSummary};
use crate::output::csv_sink::count_rows;
use crate::Result;
use std::path::Path;

/// Number of audit lines considered by `--stats`
pub const AUDIT_TAIL_LINES: usize = 500;

/// Counters for a single crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Queries sent to the search provider
    pub queries_dispatched: usize,

    /// Queries whose search failed or returned nothing
    pub empty_queries: usize,

    /// Result URLs returned across all queries
    pub urls_returned: usize,

    /// URLs skipped by the domain ledger
    pub urls_skipped: usize,

    /// Fetches attempted (one audit event each)
    pub fetches_attempted: usize,

    /// Fetches that ended in a timeout or network error
    pub fetch_failures: usize,

    /// Lead rows appended to the CSV
    pub leads_written: usize,
}

impl RunStatistics {
    /// Logs the end-of-run summary
    pub fn log_summary(&self) {
        tracing::info!(
            "[INFO] Queries: {} dispatched, {} without results",
            self.queries_dispatched,
            self.empty_queries
        );
        tracing::info!(
            "[INFO] URLs: {} returned, {} skipped, {} fetched, {} failed",
            self.urls_returned,
            self.urls_skipped,
            self.fetches_attempted,
            self.fetch_failures
        );
        tracing::info!("[INFO] Leads written: {}", self.leads_written);
    }
}

/// Summary of the files on disk
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStatistics {
    pub lead_rows: usize,
    pub audit: AuditSummary,
}

/// Loads statistics from the output CSV and the tail of the audit log
pub fn load_statistics(csv_path: &Path, audit_path: &Path) -> Result<DatasetStatistics> {
    let lead_rows = count_rows(csv_path)?;
    let events = read_tail(audit_path, AUDIT_TAIL_LINES)?;
    Ok(DatasetStatistics {
        lead_rows,
        audit: AuditSummary::from_events(&events),
    })
}

/// Prints dataset statistics to stdout
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Lead Dataset Statistics ===\n");
    println!("Lead rows: {}", stats.lead_rows);
    println!();
    println!("Audit (last {} events):", AUDIT_TAIL_LINES);
    println!("  Events: {}", stats.audit.events);
    println!("  Excluded (timeout/error): {}", stats.audit.excluded);
    println!("  With emails: {}", stats.audit.with_emails);
    println!("  Average fetch time: {}ms", stats.audit.avg_duration_ms);
}
