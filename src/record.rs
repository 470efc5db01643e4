//! Telemetry record types carried through a dispatch.
//!
//! Each call on the [`Dispatcher`](crate::Dispatcher) captures its arguments
//! into one `TelemetryRecord`, which is the unit handed to every sink during
//! fan-out. Records are plain data and cheap to clone into detached delivery
//! tasks.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use crate::report::ErrorReport;

/// String-valued custom properties attached to a record.
pub type Properties = HashMap<String, String>;

/// Named measurements attached to an event record.
pub type Measurements = HashMap<String, f64>;

/// Severity of a trace record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SeverityLevel {
    /// Diagnostic chatter.
    Verbose = 0,
    /// Routine informational messages.
    Information = 1,
    /// Something unexpected but recoverable.
    Warning = 2,
    /// An operation failed.
    Error = 3,
    /// The application is in a degraded or unusable state.
    Critical = 4,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityLevel::Verbose => "Verbose",
            SeverityLevel::Information => "Information",
            SeverityLevel::Warning => "Warning",
            SeverityLevel::Error => "Error",
            SeverityLevel::Critical => "Critical",
        };
        write!(f, "{}", name)
    }
}

/// One telemetry payload, covering the five write operations a sink supports.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TelemetryRecord {
    /// An error report with optional custom properties.
    Error {
        /// The error being reported.
        report: ErrorReport,
        /// Custom properties, if any.
        properties: Option<Properties>,
    },
    /// A named application event.
    Event {
        /// Event name.
        name: String,
        /// Custom properties, if any.
        properties: Option<Properties>,
        /// Named measurements, if any.
        metrics: Option<Measurements>,
    },
    /// A single metric sample.
    Metric {
        /// Metric name.
        name: String,
        /// Sampled value.
        value: f64,
        /// Custom properties, if any.
        properties: Option<Properties>,
    },
    /// A trace message with a severity level.
    Trace {
        /// The trace message.
        message: String,
        /// Severity of the message.
        level: SeverityLevel,
        /// Custom properties, if any.
        properties: Option<Properties>,
    },
    /// A completed request with timing and outcome.
    Request {
        /// Request name.
        name: String,
        /// When the request started.
        start_time: SystemTime,
        /// How long the request took.
        duration: Duration,
        /// Response code as reported by the handler.
        response_code: String,
        /// Whether the request succeeded.
        success: bool,
    },
}

impl TelemetryRecord {
    /// Short label for the record kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryRecord::Error { .. } => "error",
            TelemetryRecord::Event { .. } => "event",
            TelemetryRecord::Metric { .. } => "metric",
            TelemetryRecord::Trace { .. } => "trace",
            TelemetryRecord::Request { .. } => "request",
        }
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryRecord::Error { report, .. } => write!(f, "Error({})", report),
            TelemetryRecord::Event { name, .. } => write!(f, "Event({})", name),
            TelemetryRecord::Metric { name, value, .. } => {
                write!(f, "Metric({}={})", name, value)
            }
            TelemetryRecord::Trace { message, level, .. } => {
                write!(f, "Trace[{}]({})", level, message)
            }
            TelemetryRecord::Request { name, response_code, success, .. } => {
                write!(f, "Request({}, code={}, success={})", name, response_code, success)
            }
        }
    }
}
