//! NDJSON audit trail of fetch attempts
//!
//! One JSON object per line, appended and never rewritten. The dashboard may
//! delete or truncate the file between runs, so the writer reopens it (and
//! recreates its directory) on every append.

use crate::output::record::{AuditEvent, ExclusionFlag};
use crate::Result;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Serialized appender for the audit log
#[derive(Debug)]
pub struct AuditWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event as a single line
    ///
    /// Write failures are returned to the caller; they are infrastructure
    /// faults, not fetch outcomes.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Reads the last `n` events of an audit log
///
/// A missing file is an empty log. Lines that do not parse are skipped.
pub fn read_tail(path: &Path, n: usize) -> Result<Vec<AuditEvent>> {
    if !path.exists() || n == 0 {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(n);
    for line in reader.split(b'\n') {
        let line = String::from_utf8_lossy(&line?).into_owned();
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == n {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Ok(tail
        .iter()
        .filter_map(|line| match serde_json::from_str::<AuditEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("Skipping malformed audit line: {}", e);
                None
            }
        })
        .collect())
}

/// Aggregate view of a slice of audit events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditSummary {
    pub events: usize,
    pub excluded: usize,
    pub with_emails: usize,
    pub avg_duration_ms: u64,
}

impl AuditSummary {
    pub fn from_events(events: &[AuditEvent]) -> Self {
        let total_ms: u64 = events.iter().map(|e| e.duration_ms).sum();
        Self {
            events: events.len(),
            excluded: events
                .iter()
                .filter(|e| e.exclusion_flag == ExclusionFlag::Excluded)
                .count(),
            with_emails: events.iter().filter(|e| !e.emails_found.is_empty()).count(),
            avg_duration_ms: total_ms / events.len().max(1) as u64,
        }
    }
}
