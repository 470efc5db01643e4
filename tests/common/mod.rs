#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use towncrier::{ErrorReport, Measurements, Properties, SeverityLevel, SinkError, TelemetrySink};

/// Sink that rejects every write with an injected failure.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of writes attempted against this sink.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::new("injected failure"))
    }
}

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn write_error(
        &self,
        _report: &ErrorReport,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.fail()
    }

    async fn write_event(
        &self,
        _name: &str,
        _properties: Option<&Properties>,
        _metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        self.fail()
    }

    async fn write_metric(
        &self,
        _name: &str,
        _value: f64,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.fail()
    }

    async fn write_trace(
        &self,
        _message: &str,
        _level: SeverityLevel,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.fail()
    }

    async fn write_request(
        &self,
        _name: &str,
        _start_time: SystemTime,
        _duration: Duration,
        _response_code: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        self.fail()
    }
}

/// Sink that sleeps before completing each write, to make blocking callers
/// observable.
#[derive(Debug)]
pub struct SlowSink {
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, completed: AtomicUsize::new(0) })
    }

    /// Number of writes that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn finish(&self) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for SlowSink {
    async fn write_error(
        &self,
        _report: &ErrorReport,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.finish().await
    }

    async fn write_event(
        &self,
        _name: &str,
        _properties: Option<&Properties>,
        _metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        self.finish().await
    }

    async fn write_metric(
        &self,
        _name: &str,
        _value: f64,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.finish().await
    }

    async fn write_trace(
        &self,
        _message: &str,
        _level: SeverityLevel,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.finish().await
    }

    async fn write_request(
        &self,
        _name: &str,
        _start_time: SystemTime,
        _duration: Duration,
        _response_code: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        self.finish().await
    }
}

/// Sink that appends `"{name}:{kind}"` to a shared log, for asserting
/// delivery order across several sinks.
#[derive(Debug)]
pub struct RecordingSink {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self { name, log })
    }

    fn record(&self, kind: &str) -> Result<(), SinkError> {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, kind));
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn write_error(
        &self,
        _report: &ErrorReport,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.record("error")
    }

    async fn write_event(
        &self,
        _name: &str,
        _properties: Option<&Properties>,
        _metrics: Option<&Measurements>,
    ) -> Result<(), SinkError> {
        self.record("event")
    }

    async fn write_metric(
        &self,
        _name: &str,
        _value: f64,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.record("metric")
    }

    async fn write_trace(
        &self,
        _message: &str,
        _level: SeverityLevel,
        _properties: Option<&Properties>,
    ) -> Result<(), SinkError> {
        self.record("trace")
    }

    async fn write_request(
        &self,
        _name: &str,
        _start_time: SystemTime,
        _duration: Duration,
        _response_code: &str,
        _success: bool,
    ) -> Result<(), SinkError> {
        self.record("request")
    }
}
