//! The sink capability contract and built-in utility sinks.
//!
//! A [`TelemetrySink`] is anything that can persist or transmit the five
//! telemetry kinds. The dispatcher only requires that each write either
//! completes or returns a [`SinkError`]; it never looks inside a sink.
//!
//! Concrete network/email/file backends live outside this crate. The sinks
//! here exist for wiring and tests: [`NullSink`] discards, [`MemorySink`]
//! records in memory, [`LogSink`] forwards to `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{Measurements, Properties, SeverityLevel, TelemetryRecord};
use crate::report::ErrorReport;

/// Error returned by a failing sink write.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SinkError {
    /// Create a sink error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Create a sink error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { message: message.into(), source: Some(Box::new(source)) }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A telemetry backend: the five-operation write contract.
///
/// Each operation either completes or returns a `SinkError` before the call
/// resolves; the dispatcher treats any error as a transient failure and runs
/// its fallback cascade. Implementations must be safe to share across
/// concurrent dispatch tasks.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Write an error report.
    async fn write_error(
        &self,
        report: &ErrorReport,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError>;

    /// Write a named application event.
    async fn write_event(
        &self,
        name: &str,
        properties: Option<&Properties>,
        metrics: Option<&Measurements>,
    ) -> Result<(), SinkError>;

    /// Write a single metric sample.
    async fn write_metric(
        &self,
        name: &str,
        value: f64,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError>;

    /// Write a trace message.
    async fn write_trace(
        &self,
        message: &str,
        level: SeverityLevel,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError>;

    /// Write a completed request.
    async fn write_request(
        &self,
        name: &str,
        start_time: SystemTime,
        duration: Duration,
        response_code: &str,
        success: bool,
    ) -> Result<(), SinkError>;

    /// Route a captured record to the matching write operation.
    ///
    /// This is the single delivery action the dispatcher fans out; sinks get
    /// it for free and normally have no reason to override it.
    async fn write(&self, record: &TelemetryRecord) -> Result<(), SinkError> {
        match record {
            TelemetryRecord::Error { report, properties } => {
                self.write_error(report, properties.as_ref()).await
            }
            TelemetryRecord::Event { name, properties, metrics } => {
                self.write_event(name, properties.as_ref(), metrics.as_ref()).await
            }
            TelemetryRecord::Metric { name, value, properties } => {
                self.write_metric(name, *value, properties.as_ref()).await
            }
            TelemetryRecord::Trace { message, level, properties } => {
                self.write_trace(message, *level, properties.as_ref()).await
            }
            TelemetryRecord::Request { name, start_time, duration, response_code, success } => {
                self.write_request(name, *start_time, *duration, response_code, *success).await
            }
        }
    }
}

/// A sink that discards everything.
///
/// Useful as a placeholder when telemetry is disabled.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl TelemetrySink for NullSink {
    async fn write_error(
        &self,
        _report: &ErrorReport,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_event(
        &self,
        _name: &str,
        _properties: Option<&Properties>,
        _metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_metric(
        &self,
        _name: &str,
        _value: f64,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_trace(
        &self,
        _message: &str,
        _level: SeverityLevel,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_request(
        &self,
        _name: &str,
        _start_time: SystemTime,
        _duration: Duration,
        _response_code: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that stores records in memory.
///
/// The test workhorse: bounded `Vec` behind a mutex, oldest records evicted
/// once capacity is exceeded.
#[derive(Clone, Debug)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    /// Creates a bounded memory sink (default cap: 10,000).
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Creates a bounded memory sink with explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a snapshot of all records received so far.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().expect("memory sink poisoned").clone()
    }

    /// Clears all stored records.
    pub fn clear(&self) {
        self.records.lock().expect("memory sink poisoned").clear();
    }

    /// Returns the number of records stored.
    pub fn len(&self) -> usize {
        self.records.lock().expect("memory sink poisoned").len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.lock().expect("memory sink poisoned").is_empty()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of evicted records.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn push(&self, record: TelemetryRecord) {
        let mut guard = self.records.lock().expect("memory sink poisoned");
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(record);
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn write_error(
        &self,
        report: &ErrorReport,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.push(TelemetryRecord::Error {
            report: report.clone(),
            properties: properties.cloned(),
        });
        Ok(())
    }

    async fn write_event(
        &self,
        name: &str,
        properties: Option<&Properties>,
        metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        self.push(TelemetryRecord::Event {
            name: name.to_string(),
            properties: properties.cloned(),
            metrics: metrics.cloned(),
        });
        Ok(())
    }

    async fn write_metric(
        &self,
        name: &str,
        value: f64,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.push(TelemetryRecord::Metric {
            name: name.to_string(),
            value,
            properties: properties.cloned(),
        });
        Ok(())
    }

    async fn write_trace(
        &self,
        message: &str,
        level: SeverityLevel,
        properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.push(TelemetryRecord::Trace {
            message: message.to_string(),
            level,
            properties: properties.cloned(),
        });
        Ok(())
    }

    async fn write_request(
        &self,
        name: &str,
        start_time: SystemTime,
        duration: Duration,
        response_code: &str,
        success: bool,
    ) -> Result<(), SinkError> {
        self.push(TelemetryRecord::Request {
            name: name.to_string(),
            start_time,
            duration,
            response_code: response_code.to_string(),
            success,
        });
        Ok(())
    }
}

/// A sink that forwards records to the `tracing` crate.
///
/// Traces map severity to the matching tracing level; errors log at ERROR,
/// everything else at INFO.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn write_error(
        &self,
        report: &ErrorReport,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        tracing::error!(target: "towncrier::sink", error = %report, "telemetry_error");
        Ok(())
    }

    async fn write_event(
        &self,
        name: &str,
        _properties: Option<&Properties>,
        _metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        tracing::info!(target: "towncrier::sink", event = name, "telemetry_event");
        Ok(())
    }

    async fn write_metric(
        &self,
        name: &str,
        value: f64,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        tracing::info!(target: "towncrier::sink", metric = name, value, "telemetry_metric");
        Ok(())
    }

    async fn write_trace(
        &self,
        message: &str,
        level: SeverityLevel,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        match level {
            SeverityLevel::Verbose => {
                tracing::trace!(target: "towncrier::sink", "{}", message)
            }
            SeverityLevel::Information => {
                tracing::info!(target: "towncrier::sink", "{}", message)
            }
            SeverityLevel::Warning => {
                tracing::warn!(target: "towncrier::sink", "{}", message)
            }
            SeverityLevel::Error | SeverityLevel::Critical => {
                tracing::error!(target: "towncrier::sink", "{}", message)
            }
        }
        Ok(())
    }

    async fn write_request(
        &self,
        name: &str,
        _start_time: SystemTime,
        duration: Duration,
        response_code: &str,
        success: bool,
    ) -> Result<(), SinkError> {
        tracing::info!(
            target: "towncrier::sink",
            request = name,
            ?duration,
            response_code,
            success,
            "telemetry_request"
        );
        Ok(())
    }
}
