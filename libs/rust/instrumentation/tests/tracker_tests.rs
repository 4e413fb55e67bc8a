//! Integration tests for the last-seen tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use rust_instrumentation::lastseen::{CloudWatchExporter, Multi, Tracker, TrackerCell, TrackerConfig};
use rust_instrumentation::{ExportError, TrackerError};
use test_utils::mocks::{FailingExporter, RecordingExporter, RecordingSink, SlowExporter};

fn one_second() -> TrackerConfig {
    TrackerConfig::default().with_flush_interval(1).with_ticker(false)
}

async fn tracker_with(exporter: RecordingExporter) -> Tracker {
    Tracker::builder(one_second())
        .with_exporter(exporter)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_export_is_burst_controlled() {
    let exporter = RecordingExporter::new();
    let tracker = tracker_with(exporter.clone()).await;

    for _ in 0..11 {
        tracker.set_seen("F");
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    tracker.set_seen("F");
    tracker.wait_for_exporters().await;

    assert_eq!(exporter.count_for("F").await, 2);
}

#[tokio::test]
async fn test_fields_are_debounced_independently() {
    let exporter = RecordingExporter::new();
    let tracker = tracker_with(exporter.clone()).await;

    tracker.set_seen_at("a", 1_000);
    tracker.set_seen_at("b", 1_000);
    tracker.set_seen_at("a", 1_001);
    tracker.wait_for_exporters().await;

    assert_eq!(exporter.count_for("a").await, 1);
    assert_eq!(exporter.count_for("b").await, 1);
}

#[tokio::test]
async fn test_get_seen() {
    let tracker = tracker_with(RecordingExporter::new()).await;
    assert_eq!(tracker.get_seen("never"), 0);

    let before = chrono::Utc::now().timestamp();
    tracker.set_seen("F");
    let after = chrono::Utc::now().timestamp();

    let seen = tracker.get_seen("F");
    assert!(seen >= before && seen <= after);
    tracker.wait_for_exporters().await;
}

#[tokio::test]
async fn test_exported_value_is_latest_observation() {
    let exporter = RecordingExporter::new();
    let tracker = tracker_with(exporter.clone()).await;

    tracker.set_seen_at("F", 1_700_000_000);
    tracker.wait_for_exporters().await;

    let exports = exporter.exports().await;
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].field, "F");
    assert_eq!(exports[0].seen.value, 1_700_000_000);
    assert_eq!(tracker.last_seen("F").last_flush, 1_700_000_000);
}

#[tokio::test]
async fn test_failed_export_is_rolled_back() {
    let exporter = FailingExporter::times(1);
    let tracker = Tracker::builder(one_second())
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("F", 100);
    tracker.wait_for_exporters().await;
    assert_eq!(exporter.calls(), 1);
    assert_eq!(tracker.last_seen("F").last_flush, 0);
    assert_eq!(tracker.metrics().export_failures.get(), 1);

    tracker.set_seen_at("F", 101);
    tracker.wait_for_exporters().await;
    assert_eq!(exporter.calls(), 2);
    assert_eq!(tracker.last_seen("F").last_flush, 101);
    assert_eq!(tracker.metrics().exports.get(), 1);
}

#[tokio::test]
async fn test_multi_exporter_fails_fast() {
    let recording = RecordingExporter::new();
    let tracker = Tracker::builder(one_second())
        .with_exporter(FailingExporter::always())
        .with_exporter(recording.clone())
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("F", 100);
    tracker.wait_for_exporters().await;
    assert_eq!(recording.count().await, 0);
}

#[tokio::test]
async fn test_nested_multi_exports_to_all() {
    let first = RecordingExporter::new();
    let second = RecordingExporter::new();
    let tracker = Tracker::builder(one_second())
        .with_exporter(Multi::new().with(first.clone()).with(second.clone()))
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("F", 100);
    tracker.wait_for_exporters().await;
    assert_eq!(first.count().await, 1);
    assert_eq!(second.count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_observations_export_once() {
    let exporter = RecordingExporter::new();
    let tracker = Tracker::builder(TrackerConfig::default().with_flush_interval(30))
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..50 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker.set_seen_at("F", 5_000 + i % 2);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    tracker.wait_for_exporters().await;

    assert_eq!(exporter.count_for("F").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exports_of_different_fields_are_serialized() {
    let exporter = SlowExporter::new(Duration::from_millis(5));
    let tracker = Tracker::builder(one_second())
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker.set_seen_at(&format!("field-{i}"), 1_000);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    tracker.wait_for_exporters().await;

    assert_eq!(exporter.calls(), 20);
    assert_eq!(exporter.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_waiters_all_return() {
    let exporter = SlowExporter::new(Duration::from_micros(200));
    let tracker = Tracker::builder(TrackerConfig::default().with_flush_interval(0))
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();
    let clock = Arc::new(AtomicI64::new(1));

    for _ in 0..10 {
        let stop = Arc::new(AtomicBool::new(false));
        let writers: Vec<_> = (0..3)
            .map(|_| {
                let tracker = tracker.clone();
                let clock = Arc::clone(&clock);
                let stop = Arc::clone(&stop);
                tokio::spawn(async move {
                    while !stop.load(Ordering::SeqCst) {
                        tracker.set_seen_at("F", clock.fetch_add(1, Ordering::SeqCst));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let waiters: Vec<_> = (0..6)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.wait_for_exporters().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.store(true, Ordering::SeqCst);
        for writer in writers {
            writer.await.unwrap();
        }
        for waiter in waiters {
            let waited = tokio::time::timeout(Duration::from_secs(5), waiter).await;
            assert!(waited.is_ok(), "wait_for_exporters did not return after exports drained");
        }
    }

    tracker.wait_for_exporters().await;
    assert_eq!(exporter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_mode_flushes_periodically() {
    let exporter = RecordingExporter::new();
    let tracker = Tracker::builder(one_second().with_ticker(true))
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("F", 100);
    tracker.wait_for_exporters().await;
    assert_eq!(exporter.count().await, 0);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(exporter.count().await, 1);

    tracker.set_seen_at("F", 105);
    tracker.shutdown().await;
    assert_eq!(exporter.count().await, 2);
}

#[tokio::test]
async fn test_flush_all_exports_due_fields() {
    let exporter = RecordingExporter::new();
    let tracker = Tracker::builder(one_second().with_ticker(true))
        .with_exporter(exporter.clone())
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("a", 100);
    tracker.set_seen_at("b", 100);
    tracker.flush_all().await;
    assert_eq!(exporter.count().await, 2);

    tracker.flush_all().await;
    assert_eq!(exporter.count().await, 2);
    tracker.shutdown().await;
}

#[tokio::test]
async fn test_cloudwatch_exporter_through_tracker() {
    let sink = RecordingSink::new();
    let tracker = Tracker::builder(one_second())
        .exporter({
            let sink = sink.clone();
            move || async move { Ok(CloudWatchExporter::new(sink, "billing", "Liveness")) }
        })
        .build()
        .await
        .unwrap();

    tracker.set_seen_at("invoice.paid", 1_700_000_000);
    tracker.wait_for_exporters().await;

    let data = sink.data().await;
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].0, "Liveness");
    assert_eq!(data[0].1.timestamp, 1_700_000_000);
}

#[tokio::test]
async fn test_factories_invoked_once() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let tracker = Tracker::builder(one_second())
        .exporter(move || async move {
            counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(RecordingExporter::new())
        })
        .build()
        .await
        .unwrap();

    for t in 0..5 {
        tracker.set_seen_at("F", 100 + t * 10);
    }
    tracker.wait_for_exporters().await;
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_factory() {
    let result = Tracker::builder(one_second())
        .exporter(|| async { Err::<RecordingExporter, _>(ExportError::factory("no credentials")) })
        .build()
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, TrackerError::Exporter(_)));
    assert!(err.to_string().contains("no credentials"));
}

static TRACKER: TrackerCell = TrackerCell::new();

#[tokio::test]
async fn test_static_cell_keeps_first_tracker() {
    let first = RecordingExporter::new();
    let second = RecordingExporter::new();

    let tracker = TRACKER
        .get_or_build(|| Tracker::builder(one_second()).with_exporter(first.clone()))
        .await
        .unwrap();
    let again = TRACKER
        .get_or_build(|| Tracker::builder(one_second()).with_exporter(second.clone()))
        .await
        .unwrap();

    again.set_seen_at("F", 100);
    tracker.wait_for_exporters().await;
    assert_eq!(first.count().await, 1);
    assert_eq!(second.count().await, 0);
}
