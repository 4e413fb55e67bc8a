//! Mock exporters and sinks for testing.
//!
//! Mocks are cheap to clone; clones share their recordings, so a test can
//! hand one clone to the tracker and inspect the other.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_instrumentation::ExportError;
use rust_instrumentation::lastseen::{Exporter, LastSeen, MetricDatum, MetricsSink};
use tokio::sync::RwLock;

/// An export received by a mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExport {
    /// Exported field
    pub field: String,
    /// Exported state
    pub seen: LastSeen,
}

/// Exporter that records every call and always succeeds.
#[derive(Debug, Clone, Default)]
pub struct RecordingExporter {
    exports: Arc<RwLock<Vec<RecordedExport>>>,
}

impl RecordingExporter {
    /// Create a new recording exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded exports, in call order.
    pub async fn exports(&self) -> Vec<RecordedExport> {
        self.exports.read().await.clone()
    }

    /// Number of recorded exports.
    pub async fn count(&self) -> usize {
        self.exports.read().await.len()
    }

    /// Number of recorded exports of `field`.
    pub async fn count_for(&self, field: &str) -> usize {
        self.exports
            .read()
            .await
            .iter()
            .filter(|export| export.field == field)
            .count()
    }

    /// Forget all recorded exports.
    pub async fn clear(&self) {
        self.exports.write().await.clear();
    }
}

#[async_trait]
impl Exporter for RecordingExporter {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        self.exports.write().await.push(RecordedExport {
            field: field.to_string(),
            seen,
        });
        Ok(())
    }
}

/// Exporter that fails a configurable number of times, then succeeds.
#[derive(Debug, Clone)]
pub struct FailingExporter {
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FailingExporter {
    /// Fail every call.
    #[must_use]
    pub fn always() -> Self {
        Self::times(usize::MAX)
    }

    /// Fail the first `failures` calls.
    #[must_use]
    pub fn times(failures: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of calls received, failed or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Exporter for FailingExporter {
    async fn export(&self, field: &str, _seen: LastSeen) -> Result<(), ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            Err(ExportError::cloudwatch(format!("export of {field} refused")))
        } else {
            Ok(())
        }
    }
}

/// Exporter that holds every call for a fixed delay and tracks how many
/// calls overlap.
#[derive(Debug, Clone)]
pub struct SlowExporter {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl SlowExporter {
    /// Create an exporter that takes `delay` per call.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Exporter for SlowExporter {
    async fn export(&self, _field: &str, _seen: LastSeen) -> Result<(), ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Metrics sink that records every data point.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    data: Arc<RwLock<Vec<(String, MetricDatum)>>>,
}

impl RecordingSink {
    /// Create a new recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `(namespace, datum)` pairs, in call order.
    pub async fn data(&self) -> Vec<(String, MetricDatum)> {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn put_metric_data(&self, namespace: &str, datum: MetricDatum) -> Result<(), ExportError> {
        self.data.write().await.push((namespace.to_string(), datum));
        Ok(())
    }
}
