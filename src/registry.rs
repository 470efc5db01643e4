//! Ordered, append-only registry of telemetry sinks.
//!
//! Registration order is delivery order: the dispatcher walks the registry
//! front to back, and fallback lookup after a failure scans strictly forward
//! from the failing position.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::sink::TelemetrySink;

/// One registered sink and its dispatch flags.
#[derive(Clone)]
pub struct SinkRegistration {
    sink: Arc<dyn TelemetrySink>,
    fallback_only: bool,
    report_fallback_as_error: bool,
}

impl SinkRegistration {
    /// The registered sink.
    pub fn sink(&self) -> &Arc<dyn TelemetrySink> {
        &self.sink
    }

    /// True if this sink only receives cascade traffic, never primary traffic.
    pub fn fallback_only(&self) -> bool {
        self.fallback_only
    }

    /// True if, when invoked as a fallback, this sink receives a synthesized
    /// error describing the upstream failure instead of the original payload.
    pub fn report_fallback_as_error(&self) -> bool {
        self.report_fallback_as_error
    }
}

impl std::fmt::Debug for SinkRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistration")
            .field("fallback_only", &self.fallback_only)
            .field("report_fallback_as_error", &self.report_fallback_as_error)
            .finish_non_exhaustive()
    }
}

/// Ordered list of sink registrations.
///
/// Owned by the application's composition root and shared with the
/// [`Dispatcher`](crate::Dispatcher); there is no hidden global instance.
/// Entries are only ever appended or cleared wholesale; individual removal
/// is not supported.
#[derive(Default, Debug)]
pub struct SinkRegistry {
    inner: RwLock<Vec<SinkRegistration>>,
}

impl SinkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a primary sink. Registering the same sink twice yields two
    /// independent deliveries.
    pub fn register(&self, sink: Arc<dyn TelemetrySink>) {
        self.push(SinkRegistration { sink, fallback_only: false, report_fallback_as_error: false });
    }

    /// Append a fallback-only sink. It never receives primary traffic; when
    /// `report_as_error` is set it receives a synthesized error describing the
    /// upstream sink's failure instead of the original payload.
    pub fn register_fallback(&self, sink: Arc<dyn TelemetrySink>, report_as_error: bool) {
        self.push(SinkRegistration {
            sink,
            fallback_only: true,
            report_fallback_as_error: report_as_error,
        });
    }

    /// Empty the registry.
    ///
    /// Intended for test setup and teardown. Dispatches already in flight
    /// keep working against the snapshot they took; clearing concurrently
    /// with new dispatches needs external synchronization.
    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("sink registry poisoned");
        let removed = guard.len();
        guard.clear();
        debug!(target: "towncrier::registry", removed, "sink registry cleared");
    }

    /// Copy-on-read stable view of the current registrations, in order.
    pub fn snapshot(&self) -> Vec<SinkRegistration> {
        self.inner.read().expect("sink registry poisoned").clone()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.read().expect("sink registry poisoned").len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("sink registry poisoned").is_empty()
    }

    fn push(&self, registration: SinkRegistration) {
        let mut guard = self.inner.write().expect("sink registry poisoned");
        guard.push(registration);
    }
}
