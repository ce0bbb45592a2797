//! Row and event types written by the output layer

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// CSV column order of the master dataset
///
/// Reordering or renaming a column makes the next run rotate the existing file.
pub const FIELDNAMES: [&str; 13] = [
    "query",
    "country",
    "category",
    "domain",
    "homepage_url",
    "http_status",
    "duration_ms",
    "emails_all",
    "email_best",
    "phones",
    "priority",
    "last_seen",
    "email_sent",
];

/// Outcome of a fetch as recorded in the audit log and the CSV
///
/// Serialized as the bare status code, or as the literal `"Timeout"` /
/// `"Error"` for failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Code(u16),
    Timeout,
    Error,
}

impl HttpStatus {
    /// Returns true for outcomes that exclude the URL (no HTTP response)
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Timeout | Self::Error)
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{}", code),
            Self::Timeout => f.write_str("Timeout"),
            Self::Error => f.write_str("Error"),
        }
    }
}

impl Serialize for HttpStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Timeout => serializer.serialize_str("Timeout"),
            Self::Error => serializer.serialize_str("Error"),
        }
    }
}

impl<'de> Deserialize<'de> for HttpStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u16),
            Tag(String),
            Missing(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::Code(code),
            Raw::Tag(tag) if tag == "Timeout" => Self::Timeout,
            Raw::Tag(_) | Raw::Missing(()) => Self::Error,
        })
    }
}

/// `Y` when the fetch failed and the URL is excluded, `N` otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExclusionFlag {
    #[serde(rename = "Y")]
    Excluded,
    #[default]
    #[serde(rename = "N")]
    Included,
}

/// One fetch attempt, appended to the NDJSON audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// UTC time of the record, `YYYY-MM-DDTHH:MM:SS`
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub url: String,
    pub http_status: HttpStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub emails_found: Vec<String>,
    #[serde(default)]
    pub email_best: String,
    #[serde(default)]
    pub phones_found: Vec<String>,
    /// Search rank of the URL
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub exclusion_flag: ExclusionFlag,
    #[serde(default)]
    pub last_seen: String,
}

/// One lead: a domain with at least one contact email
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRow {
    pub query: String,
    /// Country code without the `site:.` prefix
    pub country: String,
    pub category: String,
    pub domain: String,
    pub homepage_url: String,
    pub http_status: HttpStatus,
    pub duration_ms: u64,
    /// Cleaned emails in first-seen order
    pub emails_all: Vec<String>,
    pub email_best: String,
    pub phones: Vec<String>,
    pub priority: u32,
    pub last_seen: String,
    /// `"No"` when written; the operator flips it by hand
    pub email_sent: String,
}

impl LeadRow {
    /// Renders the row in [`FIELDNAMES`] order
    pub fn to_record(&self) -> [String; 13] {
        [
            self.query.clone(),
            self.country.clone(),
            self.category.clone(),
            self.domain.clone(),
            self.homepage_url.clone(),
            self.http_status.to_string(),
            self.duration_ms.to_string(),
            self.emails_all.join(", "),
            self.email_best.clone(),
            self.phones.join(", "),
            self.priority.to_string(),
            self.last_seen.clone(),
            self.email_sent.clone(),
        ]
    }
}
