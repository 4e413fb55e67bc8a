//! Last-seen liveness tracking.
//!
//! [`Tracker::set_seen`] records that a field was alive now, at any call
//! rate, and exports at most about once per flush interval per field.
//! Exports run on detached tasks and never report back to the caller;
//! [`Tracker::wait_for_exporters`] waits for the ones in flight.
//!
//! Build one tracker per process in the composition root and hand out
//! clones, or keep it in a [`TrackerCell`] when a static is unavoidable.
//!
//! ```no_run
//! use rust_instrumentation::lastseen::{RedisExporter, RedisExporterConfig, Tracker, TrackerConfig};
//!
//! # async fn run() -> Result<(), rust_instrumentation::TrackerError> {
//! let tracker = Tracker::builder(TrackerConfig::default())
//!     .exporter(|| RedisExporter::connect(RedisExporterConfig::new("redis://localhost", "billing")))
//!     .build()
//!     .await?;
//!
//! tracker.set_seen("invoice.paid");
//! tracker.wait_for_exporters().await;
//! # Ok(())
//! # }
//! ```

mod cloudwatch;
mod config;
mod export;
mod redis;
mod state;

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

pub use self::cloudwatch::{CloudWatchExporter, METRIC_NAME, MetricDatum, MetricsSink};
#[cfg(feature = "cloudwatch")]
pub use self::cloudwatch::AwsCloudWatchSink;
pub use self::config::{FLUSH_INTERVAL_ENV, TrackerConfig, USE_TICKER_ENV};
pub use self::export::{Exporter, ExporterFactory, Multi, factory};
pub use self::redis::{DEFAULT_STORE_KEY, RedisExporter, RedisExporterConfig};
pub use self::state::LastSeen;

use self::state::State;
use crate::error::{ExportError, TrackerError};
use crate::metrics::TrackerMetrics;

struct Inner {
    state: State,
    exporter: Mutex<Multi>,
    config: TrackerConfig,
    metrics: TrackerMetrics,
    tasks: TaskTracker,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl Inner {
    async fn flush(&self, field: &str) {
        let Some(flush) = self.state.claim(field, self.config.flush_interval_seconds) else {
            self.metrics.skipped.inc();
            return;
        };

        let result = {
            let exporter = self.exporter.lock().await;
            exporter.export(field, flush.seen).await
        };

        match result {
            Ok(()) => {
                self.metrics.exports.inc();
                debug!(field, value = flush.seen.value, "Exported last seen");
            }
            Err(e) => {
                self.metrics.export_failures.inc();
                self.state.rollback(field, &flush);
                error!(field, error = %e, "Failed to flush last seen");
            }
        }
    }

    async fn flush_all(&self) {
        for field in self.state.fields() {
            self.flush(&field).await;
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Debounced last-seen tracker. Clones share state and exporters.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    /// Start configuring a tracker.
    #[must_use]
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder {
            config,
            factories: Vec::new(),
        }
    }

    /// Record that `field` was seen now.
    ///
    /// Never blocks. Outside ticker mode a changed value schedules an export
    /// attempt on the tracker's runtime.
    pub fn set_seen(&self, field: &str) {
        self.set_seen_at(field, chrono::Utc::now().timestamp());
    }

    /// Record that `field` was seen at `timestamp` (unix seconds).
    pub fn set_seen_at(&self, field: &str, timestamp: i64) {
        if !self.inner.state.observe(field, timestamp) {
            return;
        }
        if self.inner.config.use_ticker {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let field = field.to_string();
        self.inner.tasks.spawn_on(
            async move { inner.flush(&field).await },
            &self.inner.runtime,
        );
    }

    /// Last observed unix timestamp of `field`, 0 if never seen.
    #[must_use]
    pub fn get_seen(&self, field: &str) -> i64 {
        self.inner.state.get(field).value
    }

    /// Full state of `field`.
    #[must_use]
    pub fn last_seen(&self, field: &str) -> LastSeen {
        self.inner.state.get(field)
    }

    /// Wait until no export is in flight.
    pub async fn wait_for_exporters(&self) {
        self.inner.tasks.wait().await;
    }

    /// Export every field that is due, sequentially.
    pub async fn flush_all(&self) {
        self.inner.flush_all().await;
    }

    /// Stop the ticker, flush what is due and wait for pending exports.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.wait_for_exporters().await;
        self.inner.flush_all().await;
        info!("Last seen tracker stopped");
    }

    /// Tracker metrics.
    #[must_use]
    pub fn metrics(&self) -> &TrackerMetrics {
        &self.inner.metrics
    }

    /// Tracker configuration.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    fn start_ticker(&self) {
        let period = Duration::from_secs(self.inner.config.flush_interval_seconds.max(1).unsigned_abs());
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.flush_all().await;
                    }
                }
            }
            debug!("Last seen ticker stopped");
        });
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Collects exporter factories for a [`Tracker`].
pub struct TrackerBuilder {
    config: TrackerConfig,
    factories: Vec<ExporterFactory>,
}

impl TrackerBuilder {
    /// Add an exporter built by an async constructor at build time.
    #[must_use]
    pub fn exporter<F, Fut, E>(mut self, build: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<E, ExportError>> + Send + 'static,
        E: Exporter + 'static,
    {
        self.factories.push(factory(build));
        self
    }

    /// Add an already constructed exporter.
    #[must_use]
    pub fn with_exporter(self, exporter: impl Exporter + 'static) -> Self {
        self.exporter(move || async move { Ok(exporter) })
    }

    /// Add a boxed factory.
    #[must_use]
    pub fn with_factory(mut self, factory: ExporterFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Run the factories once, in order, and start the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NoRuntime`] outside a Tokio runtime, or the
    /// first factory failure.
    pub async fn build(self) -> Result<Tracker, TrackerError> {
        let runtime = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;

        let mut exporter = Multi::new();
        for factory in self.factories {
            exporter.push(factory().await?);
        }

        // Closed for its whole life: `wait` resolves whenever it drains and
        // `spawn_on` keeps accepting exports.
        let tasks = TaskTracker::new();
        tasks.close();

        let tracker = Tracker {
            inner: Arc::new(Inner {
                state: State::default(),
                exporter: Mutex::new(exporter),
                metrics: TrackerMetrics::new(&self.config.metrics_prefix),
                config: self.config,
                tasks,
                runtime,
                shutdown: CancellationToken::new(),
            }),
        };
        if tracker.inner.config.use_ticker {
            tracker.start_ticker();
        }

        info!(
            flush_interval_seconds = tracker.inner.config.flush_interval_seconds,
            use_ticker = tracker.inner.config.use_ticker,
            "Last seen tracker started"
        );
        Ok(tracker)
    }
}

impl std::fmt::Debug for TrackerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerBuilder")
            .field("config", &self.config)
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// A tracker constructed at most once.
///
/// Concurrent initializers wait for the first one; later calls return the
/// existing tracker without running their factories.
#[derive(Debug, Default)]
pub struct TrackerCell {
    cell: OnceCell<Tracker>,
}

impl TrackerCell {
    /// An empty cell, usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// The tracker, if constructed.
    #[must_use]
    pub fn get(&self) -> Option<&Tracker> {
        self.cell.get()
    }

    /// The tracker, constructing it from `builder` on first use.
    ///
    /// # Errors
    ///
    /// Returns the construction error; the cell stays empty and a later
    /// call may try again.
    pub async fn get_or_build<F>(&self, builder: F) -> Result<&Tracker, TrackerError>
    where
        F: FnOnce() -> TrackerBuilder,
    {
        self.cell.get_or_try_init(|| builder().build()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Exporter for Counting {
        async fn export(&self, _field: &str, _seen: LastSeen) -> Result<(), ExportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig::default().with_flush_interval(1)
    }

    #[tokio::test]
    async fn test_get_seen_defaults_to_zero() {
        let tracker = Tracker::builder(config()).build().await.unwrap();
        assert_eq!(tracker.get_seen("never"), 0);
    }

    #[tokio::test]
    async fn test_burst_is_debounced() {
        let counter = Arc::new(Counting::default());
        let tracker = Tracker::builder(config())
            .with_exporter(Arc::clone(&counter))
            .build()
            .await
            .unwrap();

        for offset in 0..10 {
            tracker.set_seen_at("F", 1_000 + offset / 5);
        }
        tracker.wait_for_exporters().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        tracker.set_seen_at("F", 1_003);
        tracker.wait_for_exporters().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.metrics().exports.get(), 2);
    }

    #[tokio::test]
    async fn test_factory_error_fails_build() {
        let result = Tracker::builder(config())
            .exporter(|| async { Err::<Counting, _>(ExportError::factory("no credentials")) })
            .build()
            .await;
        assert!(matches!(result, Err(TrackerError::Exporter(_))));
    }

    #[tokio::test]
    async fn test_cell_builds_once() {
        let cell = TrackerCell::new();
        let builds = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let builds = Arc::clone(&builds);
            cell.get_or_build(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                Tracker::builder(config())
            })
            .await
            .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cell.get().is_some());
    }

    #[test]
    fn test_build_requires_runtime() {
        let result = futures::executor::block_on(Tracker::builder(config()).build());
        assert!(matches!(result, Err(TrackerError::NoRuntime)));
    }
}
