//! In-process counters for the client and tracker, rendered in Prometheus
//! text format.

use std::sync::atomic::{AtomicU64, Ordering};

/// A simple counter metric.
#[derive(Debug)]
pub struct Counter {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount.
    pub fn inc_by(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// A simple gauge metric.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Gauge {
    /// Create a new gauge.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Set the gauge value.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Increment the gauge by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Outbound client metrics.
#[derive(Debug)]
pub struct ClientMetrics {
    /// Calls issued through the client
    pub requests: Counter,
    /// Network attempts, retries included
    pub attempts: Counter,
    /// Calls that ended with an error other than a timeout
    pub failures: Counter,
    /// Calls that ended with the timeout sentinel
    pub timeouts: Counter,
    /// Deadline timers not yet released
    pub active_deadlines: Gauge,
}

impl ClientMetrics {
    /// Create new client metrics with the given prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            requests: Counter::new(
                format!("{prefix}_http_client_requests_total"),
                "Total number of outbound calls",
            ),
            attempts: Counter::new(
                format!("{prefix}_http_client_attempts_total"),
                "Total number of outbound attempts including retries",
            ),
            failures: Counter::new(
                format!("{prefix}_http_client_failures_total"),
                "Total number of failed outbound calls",
            ),
            timeouts: Counter::new(
                format!("{prefix}_http_client_timeouts_total"),
                "Total number of timed out outbound calls",
            ),
            active_deadlines: Gauge::new(
                format!("{prefix}_http_client_active_deadlines"),
                "Current number of unreleased request deadlines",
            ),
        }
    }

    /// Format all metrics as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.requests.to_prometheus(),
            self.attempts.to_prometheus(),
            self.failures.to_prometheus(),
            self.timeouts.to_prometheus(),
            self.active_deadlines.to_prometheus()
        )
    }
}

/// Last-seen tracker metrics.
#[derive(Debug)]
pub struct TrackerMetrics {
    /// Successful exports
    pub exports: Counter,
    /// Failed exports (rolled back)
    pub export_failures: Counter,
    /// Observations that did not qualify for an export
    pub skipped: Counter,
}

impl TrackerMetrics {
    /// Create new tracker metrics with the given prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            exports: Counter::new(
                format!("{prefix}_last_seen_exports_total"),
                "Total number of last seen exports",
            ),
            export_failures: Counter::new(
                format!("{prefix}_last_seen_export_failures_total"),
                "Total number of failed last seen exports",
            ),
            skipped: Counter::new(
                format!("{prefix}_last_seen_skipped_total"),
                "Total number of burst controlled observations",
            ),
        }
    }

    /// Format all metrics as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "{}{}{}",
            self.exports.to_prometheus(),
            self.export_failures.to_prometheus(),
            self.skipped.to_prometheus()
        )
    }
}
