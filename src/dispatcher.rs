//! Fan-out dispatch of telemetry records across the sink registry.
//!
//! Every `report_*` call captures its payload into one
//! [`TelemetryRecord`](crate::record::TelemetryRecord) and spawns a detached
//! delivery task; the caller returns immediately and never observes sink I/O,
//! sink errors, or sink panics. Within one dispatch, sinks are visited in
//! registration order. Across dispatches no ordering is guaranteed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::dedup::{ErrorCache, Verdict};
use crate::record::{Measurements, Properties, SeverityLevel, TelemetryRecord};
use crate::registry::{SinkRegistration, SinkRegistry};
use crate::report::ErrorReport;
use crate::sink::SinkError;

/// Process-wide telemetry facade.
///
/// Owns the error cache and shares the [`SinkRegistry`] handed to it by the
/// composition root. Cloning is cheap; clones share the same registry, cache,
/// and in-flight tracking.
///
/// All `report_*` methods must be called from within a tokio runtime.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<SinkRegistry>,
    cache: Arc<ErrorCache>,
    in_flight: Arc<InFlight>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry` with the default monotonic clock.
    pub fn new(registry: Arc<SinkRegistry>) -> Self {
        Self {
            registry,
            cache: Arc::new(ErrorCache::new()),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Create a dispatcher whose error cache uses an injected clock, for
    /// tests of the resend and expiration windows.
    pub fn with_clock(registry: Arc<SinkRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            cache: Arc::new(ErrorCache::with_clock(clock)),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// The shared sink registry.
    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.registry
    }

    /// The error cache consulted by [`report_error`](Self::report_error).
    pub fn error_cache(&self) -> &ErrorCache {
        &self.cache
    }

    /// Report an error.
    ///
    /// The only deduplicated operation: duplicates inside the resend interval
    /// are dropped before any sink is touched, and a recurring error past the
    /// interval is delivered wrapped in a recurrence summary.
    pub fn report_error(&self, report: ErrorReport, properties: Option<Properties>) {
        let payload = match self.cache.check(&report) {
            Verdict::Send(payload) => payload,
            Verdict::Suppress => {
                debug!(target: "towncrier::dispatch", error = %report, "duplicate error suppressed");
                return;
            }
        };
        self.dispatch(TelemetryRecord::Error { report: payload, properties });
    }

    /// Report a named application event.
    pub fn report_event(
        &self,
        name: impl Into<String>,
        properties: Option<Properties>,
        metrics: Option<Measurements>,
    ) {
        self.dispatch(TelemetryRecord::Event { name: name.into(), properties, metrics });
    }

    /// Report a single metric sample.
    pub fn report_metric(
        &self,
        name: impl Into<String>,
        value: f64,
        properties: Option<Properties>,
    ) {
        self.dispatch(TelemetryRecord::Metric { name: name.into(), value, properties });
    }

    /// Report a trace message.
    pub fn report_trace(
        &self,
        message: impl Into<String>,
        level: SeverityLevel,
        properties: Option<Properties>,
    ) {
        self.dispatch(TelemetryRecord::Trace { message: message.into(), level, properties });
    }

    /// Report a completed request.
    pub fn report_request(
        &self,
        name: impl Into<String>,
        start_time: SystemTime,
        duration: Duration,
        response_code: impl Into<String>,
        success: bool,
    ) {
        self.dispatch(TelemetryRecord::Request {
            name: name.into(),
            start_time,
            duration,
            response_code: response_code.into(),
            success,
        });
    }

    /// Wait until every in-flight delivery task has finished.
    ///
    /// Dispatch is fire-and-forget and exposes no per-call handle; this is
    /// the coarse alternative for graceful shutdown and deterministic tests.
    pub async fn drain(&self) {
        self.in_flight.drained().await;
    }

    fn dispatch(&self, record: TelemetryRecord) {
        let registry = Arc::clone(&self.registry);
        let guard = InFlightGuard::start(Arc::clone(&self.in_flight));
        tokio::spawn(async move {
            // Snapshot inside the task: registrations added after the caller
            // returned but before delivery started are included.
            fan_out(registry.snapshot(), record).await;
            drop(guard);
        });
    }
}

/// Deliver `record` to every primary sink in registration order, cascading to
/// fallback sinks on failure. Nothing escapes this function.
async fn fan_out(snapshot: Vec<SinkRegistration>, record: TelemetryRecord) {
    for (position, registration) in snapshot.iter().enumerate() {
        if registration.fallback_only() {
            continue;
        }
        if let Err(error) = registration.sink().write(&record).await {
            warn!(
                target: "towncrier::dispatch",
                position,
                kind = record.kind(),
                %error,
                "primary sink failed; scanning for fallback"
            );
            cascade(&snapshot, position + 1, error, &record).await;
        }
    }
}

/// Forward scan for a fallback sink, carrying the causing error.
///
/// Expressed as a loop rather than recursion so a long chain of failing
/// fallbacks cannot grow the stack with the registry.
async fn cascade(
    snapshot: &[SinkRegistration],
    start: usize,
    mut causing: SinkError,
    record: &TelemetryRecord,
) {
    let mut from = start;
    loop {
        let Some((position, registration)) = snapshot
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, registration)| registration.fallback_only())
        else {
            debug!(
                target: "towncrier::dispatch",
                kind = record.kind(),
                %causing,
                "no fallback sink remaining; telemetry dropped"
            );
            return;
        };

        let attempt = if registration.report_fallback_as_error() {
            let synthesized = synthesize_failure_report(&causing, record);
            registration.sink().write_error(&synthesized, None).await
        } else {
            registration.sink().write(record).await
        };

        match attempt {
            Ok(()) => return,
            Err(error) => {
                debug!(
                    target: "towncrier::dispatch",
                    position,
                    %error,
                    "fallback sink failed; continuing scan"
                );
                causing = error;
                from = position + 1;
            }
        }
    }
}

/// Error report describing an upstream sink failure, delivered to fallback
/// sinks registered with `report_as_error`.
fn synthesize_failure_report(causing: &SinkError, record: &TelemetryRecord) -> ErrorReport {
    ErrorReport::new(format!("telemetry sink failed while writing {} record", record.kind()))
        .caused_by(ErrorReport::from_error(causing))
}

/// Count of spawned delivery tasks, with a notification when it hits zero.
#[derive(Debug, Default)]
struct InFlight {
    active: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    async fn drained(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count on drop, so a panicking sink cannot leave
/// `drain` waiting forever.
#[derive(Debug)]
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn start(tracker: Arc<InFlight>) -> Self {
        tracker.active.fetch_add(1, Ordering::AcqRel);
        Self(tracker)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}
