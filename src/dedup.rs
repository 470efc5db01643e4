//! Time-windowed suppression of repeated error reports.
//!
//! A hot-path failure can produce the same error thousands of times a minute.
//! The [`ErrorCache`] keeps one entry per error signature and decides, under a
//! single lock, whether a report is novel (send it), a repeat inside the
//! resend interval (suppress it), a repeat past the interval (send a wrapped
//! report carrying the occurrence count), or stale (start over).
//!
//! Only the error path is deduplicated; events, metrics, traces, and requests
//! bypass this cache entirely.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::report::ErrorReport;

/// Maximum age of a cache entry before a repeat is treated as brand-new.
pub const EXPIRATION_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Minimum time between two deliveries of the same recurring error.
pub const RESEND_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Outcome of a cache check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Deliver this payload: the original report for novel or expired
    /// signatures, a wrapped report carrying the occurrence count for a
    /// resend past the interval.
    Send(ErrorReport),
    /// Duplicate inside the resend interval; do not deliver.
    Suppress,
}

#[derive(Debug)]
struct CacheEntry {
    count: u64,
    created_at_millis: u64,
    last_sent_at_millis: u64,
}

impl CacheEntry {
    fn new(now: u64) -> Self {
        Self { count: 1, created_at_millis: now, last_sent_at_millis: now }
    }
}

/// Process-local cache of recently seen error signatures.
///
/// The whole read-decide-mutate sequence runs under one mutex so two
/// concurrent reports of the same error cannot both observe a stale count.
#[derive(Debug)]
pub struct ErrorCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for ErrorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCache {
    /// Create a cache backed by the monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::default()))
    }

    /// Create a cache with an injected clock, for tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Decide whether `report` should be delivered, suppressed, or delivered
    /// wrapped in a recurrence summary.
    pub fn check(&self, report: &ErrorReport) -> Verdict {
        use std::collections::hash_map::Entry;

        let now = self.clock.now_millis();
        let key = signature(report);
        let mut entries = self.entries.lock().expect("error cache poisoned");

        let entry = match entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry::new(now));
                return Verdict::Send(report.clone());
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if now.saturating_sub(entry.created_at_millis) > as_millis(EXPIRATION_WINDOW) {
            // Stale entry: start a fresh window, counting from 1 again.
            *entry = CacheEntry::new(now);
            return Verdict::Send(report.clone());
        }

        entry.count += 1;
        if now.saturating_sub(entry.last_sent_at_millis) > as_millis(RESEND_INTERVAL) {
            entry.last_sent_at_millis = now;
            let elapsed_minutes = now.saturating_sub(entry.created_at_millis) / 60_000;
            return Verdict::Send(wrap_recurring(report, entry.count, elapsed_minutes));
        }

        Verdict::Suppress
    }

    /// How many times this report's signature has been observed in the
    /// current window, if it is cached at all.
    pub fn occurrences(&self, report: &ErrorReport) -> Option<u64> {
        let entries = self.entries.lock().expect("error cache poisoned");
        entries.get(&signature(report)).map(|entry| entry.count)
    }

    /// Drop all cached signatures. Intended for test isolation.
    pub fn clear(&self) {
        self.entries.lock().expect("error cache poisoned").clear();
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Build the resend payload: a summary message with the original report as
/// its cause. The input is never mutated.
fn wrap_recurring(report: &ErrorReport, count: u64, elapsed_minutes: u64) -> ErrorReport {
    ErrorReport::new(format!(
        "The following error was received {} times in the last {} minutes",
        count, elapsed_minutes
    ))
    .caused_by(report.clone())
}

/// Deterministic signature over a report's cause chain.
///
/// Messages are appended outermost to innermost, lower-cased with spaces
/// removed; the innermost report also contributes its source component.
/// Structurally identical chains collapse to the same signature regardless of
/// how the reports were constructed. The u64 hash can collide across
/// unrelated chains; that is an accepted tradeoff for bounded key size.
fn signature(report: &ErrorReport) -> u64 {
    let mut buffer = String::new();
    for link in report.chain() {
        append_normalized(&mut buffer, link.message());
        if link.cause().is_none() {
            if let Some(component) = link.source_component() {
                if !component.is_empty() {
                    append_normalized(&mut buffer, component);
                }
            }
        }
    }

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    buffer.hash(&mut hasher);
    hasher.finish()
}

fn append_normalized(buffer: &mut String, text: &str) {
    buffer.extend(text.chars().filter(|c| *c != ' ').flat_map(char::to_lowercase));
}
