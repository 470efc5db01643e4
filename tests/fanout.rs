mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use common::{FailingSink, RecordingSink, SlowSink};
use towncrier::{
    Dispatcher, ErrorReport, MemorySink, SeverityLevel, SinkRegistry, TelemetryRecord,
};

fn dispatcher() -> (Dispatcher, Arc<SinkRegistry>) {
    let registry = Arc::new(SinkRegistry::new());
    (Dispatcher::new(registry.clone()), registry)
}

#[tokio::test]
async fn fresh_error_reaches_every_primary_sink_in_order() {
    let (dispatcher, registry) = dispatcher();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry.register(RecordingSink::new("a", log.clone()));
    registry.register(RecordingSink::new("b", log.clone()));

    dispatcher.report_error(ErrorReport::new("disk failure"), None);
    dispatcher.drain().await;

    assert_eq!(*log.lock().unwrap(), vec!["a:error", "b:error"]);
}

#[tokio::test]
async fn every_record_kind_fans_out() {
    let (dispatcher, registry) = dispatcher();
    let sink = Arc::new(MemorySink::new());
    registry.register(sink.clone());

    dispatcher.report_error(ErrorReport::new("boom"), None);
    dispatcher.report_event("deploy", None, None);
    dispatcher.report_metric("queue_depth", 4.0, None);
    dispatcher.report_trace("warming cache", SeverityLevel::Information, None);
    dispatcher.report_request(
        "GET /health",
        SystemTime::now(),
        Duration::from_millis(12),
        "200",
        true,
    );
    dispatcher.drain().await;

    let mut kinds: Vec<&str> = sink.records().iter().map(|r| r.kind()).collect();
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["error", "event", "metric", "request", "trace"]);
}

#[tokio::test]
async fn failing_primary_falls_back_with_original_payload() {
    let (dispatcher, registry) = dispatcher();
    let primary = FailingSink::new();
    let fallback = Arc::new(MemorySink::new());
    registry.register(primary.clone());
    registry.register_fallback(fallback.clone(), false);

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    assert_eq!(primary.attempts(), 1);
    let records = fallback.records();
    assert_eq!(records.len(), 1);
    assert!(matches!(&records[0], TelemetryRecord::Event { name, .. } if name == "X"));
}

#[tokio::test]
async fn fallback_can_report_the_failure_instead_of_the_payload() {
    let (dispatcher, registry) = dispatcher();
    let primary = FailingSink::new();
    let fallback = Arc::new(MemorySink::new());
    registry.register(primary.clone());
    registry.register_fallback(fallback.clone(), true);

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    let records = fallback.records();
    assert_eq!(records.len(), 1);
    let TelemetryRecord::Error { report, .. } = &records[0] else {
        panic!("expected a synthesized error record, got {}", records[0]);
    };
    assert!(report.message().contains("telemetry sink failed"));
    assert!(report.message().contains("event"));
    assert_eq!(report.root_cause().message(), "injected failure");
}

#[tokio::test]
async fn cascade_continues_past_a_failing_fallback() {
    let (dispatcher, registry) = dispatcher();
    let primary = FailingSink::new();
    let first_fallback = FailingSink::new();
    let second_fallback = Arc::new(MemorySink::new());
    registry.register(primary.clone());
    registry.register_fallback(first_fallback.clone(), false);
    registry.register_fallback(second_fallback.clone(), false);

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    assert_eq!(primary.attempts(), 1);
    assert_eq!(first_fallback.attempts(), 1);
    assert_eq!(second_fallback.len(), 1);
}

#[tokio::test]
async fn exhausted_cascade_drops_silently() {
    let (dispatcher, registry) = dispatcher();
    let primary = FailingSink::new();
    let only_fallback = FailingSink::new();
    registry.register(primary.clone());
    registry.register_fallback(only_fallback.clone(), false);

    // Must not panic or surface anything to the caller.
    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    assert_eq!(primary.attempts(), 1);
    assert_eq!(only_fallback.attempts(), 1);
}

#[tokio::test]
async fn fallback_scan_is_strictly_forward() {
    let (dispatcher, registry) = dispatcher();
    let earlier_fallback = Arc::new(MemorySink::new());
    let primary = FailingSink::new();
    registry.register_fallback(earlier_fallback.clone(), false);
    registry.register(primary.clone());

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    // The only fallback sits before the failing sink, so nothing absorbs
    // the failure.
    assert!(earlier_fallback.is_empty());
}

#[tokio::test]
async fn fallback_only_sink_gets_no_primary_traffic() {
    let (dispatcher, registry) = dispatcher();
    let primary = Arc::new(MemorySink::new());
    let fallback = Arc::new(MemorySink::new());
    registry.register(primary.clone());
    registry.register_fallback(fallback.clone(), false);

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    assert_eq!(primary.len(), 1);
    assert!(fallback.is_empty());
}

#[tokio::test]
async fn one_sink_failing_does_not_starve_later_primaries() {
    let (dispatcher, registry) = dispatcher();
    let failing = FailingSink::new();
    let healthy = Arc::new(MemorySink::new());
    registry.register(failing.clone());
    registry.register(healthy.clone());

    dispatcher.report_event("X", None, None);
    dispatcher.drain().await;

    assert_eq!(failing.attempts(), 1);
    assert_eq!(healthy.len(), 1);
}

#[tokio::test]
async fn caller_does_not_block_on_a_slow_sink() {
    let (dispatcher, registry) = dispatcher();
    let slow = SlowSink::new(Duration::from_millis(300));
    registry.register(slow.clone());

    let started = Instant::now();
    dispatcher.report_error(ErrorReport::new("slow path"), None);
    let returned_after = started.elapsed();

    assert!(
        returned_after < Duration::from_millis(100),
        "report_error blocked for {:?}",
        returned_after
    );
    assert_eq!(slow.completed(), 0);

    dispatcher.drain().await;
    assert_eq!(slow.completed(), 1);
}

#[tokio::test]
async fn concurrent_dispatches_all_arrive() {
    let (dispatcher, registry) = dispatcher();
    let sink = Arc::new(MemorySink::new());
    registry.register(sink.clone());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.report_metric(format!("metric_{}", i), i as f64, None);
            })
        })
        .collect();
    futures::future::join_all(handles).await;
    dispatcher.drain().await;

    assert_eq!(sink.len(), 32);
}

#[tokio::test]
async fn clearing_the_registry_stops_future_deliveries() {
    let (dispatcher, registry) = dispatcher();
    let sink = Arc::new(MemorySink::new());
    registry.register(sink.clone());

    dispatcher.report_event("before", None, None);
    dispatcher.drain().await;

    registry.clear();
    dispatcher.report_event("after", None, None);
    dispatcher.drain().await;

    assert_eq!(sink.len(), 1);
}
