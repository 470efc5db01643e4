#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Towncrier 📯
//!
//! Telemetry fan-out for async Rust: one `report_*` call, every registered
//! backend hears about it.
//!
//! ## Features
//!
//! - **Ordered fan-out** across an append-only sink registry
//! - **Failure isolation**: one misbehaving sink never affects the others or
//!   the caller
//! - **Fallback cascades**: failed deliveries fail over to designated
//!   fallback sinks, which can themselves chain
//! - **Duplicate-error suppression** with a time-windowed cache (5 minute
//!   resend interval, 60 minute expiration window)
//! - **Fire-and-forget dispatch**: callers never block on sink I/O
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use towncrier::{Dispatcher, ErrorReport, LogSink, MemorySink, SinkRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(SinkRegistry::new());
//!     registry.register(Arc::new(LogSink));
//!     registry.register_fallback(Arc::new(MemorySink::new()), false);
//!
//!     let telemetry = Dispatcher::new(registry);
//!     telemetry.report_event("startup", None, None);
//!     telemetry.report_error(ErrorReport::new("cache warm-up failed"), None);
//!
//!     // Optional: wait for in-flight deliveries before shutdown.
//!     telemetry.drain().await;
//! }
//! ```

pub mod clock;
pub mod dedup;
pub mod dispatcher;
pub mod record;
pub mod registry;
pub mod report;
pub mod sink;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dedup::{ErrorCache, Verdict, EXPIRATION_WINDOW, RESEND_INTERVAL};
pub use dispatcher::Dispatcher;
pub use record::{Measurements, Properties, SeverityLevel, TelemetryRecord};
pub use registry::{SinkRegistration, SinkRegistry};
pub use report::ErrorReport;
pub use sink::{LogSink, MemorySink, NullSink, SinkError, TelemetrySink};
