//! Output module for the lead dataset and the audit trail
//!
//! This module handles:
//! - The append-only CSV master file with schema rotation
//! - The NDJSON audit log of every fetch attempt
//! - Run and dataset statistics

mod audit;
mod csv_sink;
mod record;
pub mod stats;

pub use audit::{read_tail, AuditSummary, AuditWriter};
pub use csv_sink::{count_rows, read_existing_header, read_ledger_rows, rotated_name, CsvSink};
pub use record::{AuditEvent, ExclusionFlag, HttpStatus, LeadRow, FIELDNAMES};
pub use stats::{load_statistics, print_statistics, DatasetStatistics, RunStatistics};
