//! Contact extraction from raw HTML
//!
//! Extraction is best-effort regex scanning behind the [`Extractor`] trait so
//! a stricter strategy can replace it without touching the coordinator.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex is valid")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[\s\-.]?)?(?:\(?\d{2,4}\)?[\s\-.]?)\d{3,4}[\s\-.]?\d{3,4}")
        .expect("phone regex is valid")
});

/// Role accounts that are never picked as the best contact
pub const EMAIL_AVOID: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "webmaster",
    "postmaster",
    "abuse",
];

/// Preferred local-part keywords, best first
pub const EMAIL_PREFER: &[&str] = &[
    "contacto",
    "contact",
    "info",
    "comercial",
    "ventas",
    "sales",
    "admisiones",
    "secretaria",
    "general",
    "prensa",
    "comunicacion",
    "informes",
];

const TRIM_CHARS: &[char] = &['.', ',', ';', ':', '(', ')', '[', ']', '<', '>', '"', '\''];

/// Contacts found in one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Cleaned, deduplicated emails in first-seen order
    pub emails: Vec<String>,

    /// Deduplicated phone-like strings in first-seen order
    pub phones: Vec<String>,
}

/// Strategy for pulling contacts out of a page body
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Extraction;
}

/// Regex scan over the raw HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtractor;

impl Extractor for RegexExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let emails = clean_emails(EMAIL_RE.find_iter(html).map(|m| m.as_str()));

        let mut seen = HashSet::new();
        let phones = PHONE_RE
            .find_iter(html)
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        Extraction { emails, phones }
    }
}

/// Trims, lower-cases and deduplicates emails, dropping placeholder domains
pub fn clean_emails<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for email in raw {
        let email = email.trim().trim_matches(TRIM_CHARS).to_lowercase();
        if email.is_empty() || email.contains("example.") {
            continue;
        }
        if seen.insert(email.clone()) {
            out.push(email);
        }
    }
    out
}

/// Chooses the most useful contact address
///
/// Role accounts are rejected, then candidates are ranked by the first
/// preferred keyword they contain, then by matching the site's own domain,
/// then by the shortest local part. If every candidate is a role account the
/// first email is returned. Returns an empty string only for an empty list.
pub fn pick_best_email(emails: &[String], domain: &str) -> String {
    let own_suffix = format!("@{}", domain.to_lowercase());

    emails
        .iter()
        .filter_map(|email| {
            let low = email.to_lowercase();
            if EMAIL_AVOID.iter().any(|bad| low.contains(bad)) {
                return None;
            }
            let prefer_rank = EMAIL_PREFER
                .iter()
                .position(|kw| low.contains(kw))
                .unwrap_or(usize::MAX);
            let foreign = !(domain.is_empty() || low.ends_with(&own_suffix));
            let local_len = low.split('@').next().map_or(0, str::len);
            Some(((prefer_rank, foreign, local_len), email))
        })
        // min_by_key keeps the first of equal keys, preserving page order
        .min_by_key(|(key, _)| *key)
        .map(|(_, email)| email.clone())
        .or_else(|| emails.first().cloned())
        .unwrap_or_default()
}
