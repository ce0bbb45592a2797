use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Default)]
struct LedgerInner {
    /// Domain -> last time it yielded at least one email
    seen: HashMap<String, DateTime<Utc>>,

    /// Domains with a fetch currently running
    in_flight: HashSet<String>,
}

/// Record of domains already mined, used to avoid redundant fetches
///
/// The ledger is rebuilt from the output CSV on every start and is shared by
/// all fetch tasks of a query, so every method takes `&self`. Keys are
/// lower-cased on the way in.
#[derive(Debug)]
pub struct DomainLedger {
    ttl_days: u32,
    inner: Mutex<LedgerInner>,
}

impl DomainLedger {
    /// Creates an empty ledger
    ///
    /// `ttl_days == 0` means a seen domain is never processed again.
    pub fn new(ttl_days: u32) -> Self {
        Self {
            ttl_days,
            inner: Mutex::new(LedgerInner::default()),
        }
    }

    pub fn ttl_days(&self) -> u32 {
        self.ttl_days
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks whether a domain is eligible for fetching right now
    pub fn should_process(&self, domain: &str) -> bool {
        self.should_process_at(domain, Utc::now())
    }

    /// Checks whether a domain is eligible at the given instant
    ///
    /// Unseen domains are always eligible. A seen domain is eligible only
    /// when the TTL is positive and at least `ttl_days` have elapsed since it
    /// was last processed.
    pub fn should_process_at(&self, domain: &str, now: DateTime<Utc>) -> bool {
        let inner = self.lock();
        Self::eligible(&inner, self.ttl_days, &domain.to_lowercase(), now)
    }

    fn eligible(inner: &LedgerInner, ttl_days: u32, domain: &str, now: DateTime<Utc>) -> bool {
        match inner.seen.get(domain) {
            None => true,
            Some(_) if ttl_days == 0 => false,
            Some(last) => {
                let elapsed_days = (now - *last).num_milliseconds() as f64 / MILLIS_PER_DAY;
                elapsed_days >= f64::from(ttl_days)
            }
        }
    }

    /// Records that a domain yielded at least one email now
    pub fn mark_processed(&self, domain: &str) {
        self.mark_processed_at(domain, Utc::now());
    }

    pub fn mark_processed_at(&self, domain: &str, when: DateTime<Utc>) {
        self.lock().seen.insert(domain.to_lowercase(), when);
    }

    /// Reserves an eligible domain for a fetch
    ///
    /// Returns false if the domain is ineligible or another task of the same
    /// query already holds it. A successful claim must be followed by
    /// [`DomainLedger::release`].
    pub fn try_claim(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        let mut inner = self.lock();
        if inner.in_flight.contains(&domain)
            || !Self::eligible(&inner, self.ttl_days, &domain, Utc::now())
        {
            return false;
        }
        inner.in_flight.insert(domain);
        true
    }

    /// Ends a claim, marking the domain processed if it produced emails
    pub fn release(&self, domain: &str, found_emails: bool) {
        let domain = domain.to_lowercase();
        let mut inner = self.lock();
        inner.in_flight.remove(&domain);
        if found_emails {
            inner.seen.insert(domain, Utc::now());
        }
    }

    /// Last time the domain was processed, if ever
    pub fn last_processed(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.lock().seen.get(&domain.to_lowercase()).copied()
    }

    /// Seeds the ledger from `(domain, last_seen)` pairs of existing output rows
    ///
    /// Unparsable or empty timestamps count as "now". Empty domains are
    /// skipped. Returns the number of distinct domains in the ledger.
    pub fn preload<I, D, T>(&self, rows: I) -> usize
    where
        I: IntoIterator<Item = (D, T)>,
        D: AsRef<str>,
        T: AsRef<str>,
    {
        let now = Utc::now();
        let mut inner = self.lock();
        for (domain, last_seen) in rows {
            let domain = domain.as_ref().trim().to_lowercase();
            if domain.is_empty() {
                continue;
            }
            let ts = parse_last_seen(last_seen.as_ref()).unwrap_or(now);
            inner.seen.insert(domain, ts);
        }
        inner.seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a `last_seen` cell
///
/// Accepts RFC 3339 timestamps, naive ISO-8601 date-times (interpreted in
/// local time, as written by earlier versions of the dataset) and bare dates.
pub fn parse_last_seen(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
