//! Metrics service exporter.
//!
//! Every export becomes one `LastSeen` data point of value 1, timestamped
//! at the observation and dimensioned by `ServiceName` and `Action`. The
//! transport sits behind [`MetricsSink`]; the AWS SDK sink is available with
//! the `cloudwatch` feature.

use async_trait::async_trait;

use super::export::Exporter;
use super::state::LastSeen;
use crate::error::ExportError;

/// Metric name of every data point.
pub const METRIC_NAME: &str = "LastSeen";

/// One data point.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDatum {
    /// Metric name
    pub metric_name: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Sample value
    pub value: f64,
    /// Dimension name/value pairs, in order
    pub dimensions: Vec<(String, String)>,
}

/// Transport for metric data points.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Publish `datum` under `namespace`.
    async fn put_metric_data(&self, namespace: &str, datum: MetricDatum) -> Result<(), ExportError>;
}

/// Publishes last-seen observations as metric data points.
#[derive(Debug, Clone)]
pub struct CloudWatchExporter<S> {
    sink: S,
    service_name: String,
    namespace: String,
}

impl<S: MetricsSink> CloudWatchExporter<S> {
    /// Exporter publishing through `sink`.
    pub fn new(sink: S, service_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            sink,
            service_name: service_name.into(),
            namespace: namespace.into(),
        }
    }

    /// The data point published for an observation.
    #[must_use]
    pub fn datum(&self, field: &str, seen: LastSeen) -> MetricDatum {
        MetricDatum {
            metric_name: METRIC_NAME.to_string(),
            timestamp: seen.value,
            value: 1.0,
            dimensions: vec![
                ("ServiceName".to_string(), self.service_name.clone()),
                ("Action".to_string(), field.to_string()),
            ],
        }
    }

    /// The sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait]
impl<S: MetricsSink> Exporter for CloudWatchExporter<S> {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        self.sink
            .put_metric_data(&self.namespace, self.datum(field, seen))
            .await
    }
}

#[cfg(feature = "cloudwatch")]
pub use aws::AwsCloudWatchSink;

#[cfg(feature = "cloudwatch")]
mod aws {
    use async_trait::async_trait;
    use aws_sdk_cloudwatch::primitives::DateTime;
    use aws_sdk_cloudwatch::types::{Dimension, MetricDatum as AwsDatum, StandardUnit};

    use super::{CloudWatchExporter, MetricDatum, MetricsSink};
    use crate::error::ExportError;

    /// [`MetricsSink`] backed by the AWS SDK.
    #[derive(Debug, Clone)]
    pub struct AwsCloudWatchSink {
        client: aws_sdk_cloudwatch::Client,
    }

    impl AwsCloudWatchSink {
        /// Sink over an existing SDK client.
        #[must_use]
        pub const fn new(client: aws_sdk_cloudwatch::Client) -> Self {
            Self { client }
        }

        /// Sink using the shared AWS configuration of the environment.
        pub async fn from_env() -> Self {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            Self::new(aws_sdk_cloudwatch::Client::new(&config))
        }
    }

    impl CloudWatchExporter<AwsCloudWatchSink> {
        /// Exporter using the shared AWS configuration of the environment.
        ///
        /// # Errors
        ///
        /// Currently infallible; the signature matches exporter factories.
        pub async fn connect(
            service_name: impl Into<String>,
            namespace: impl Into<String>,
        ) -> Result<Self, ExportError> {
            Ok(Self::new(AwsCloudWatchSink::from_env().await, service_name, namespace))
        }
    }

    #[async_trait]
    impl MetricsSink for AwsCloudWatchSink {
        async fn put_metric_data(&self, namespace: &str, datum: MetricDatum) -> Result<(), ExportError> {
            let dimensions = datum
                .dimensions
                .into_iter()
                .map(|(name, value)| Dimension::builder().name(name).value(value).build())
                .collect();
            let datum = AwsDatum::builder()
                .metric_name(datum.metric_name)
                .timestamp(DateTime::from_secs(datum.timestamp))
                .unit(StandardUnit::None)
                .value(datum.value)
                .set_dimensions(Some(dimensions))
                .build();

            self.client
                .put_metric_data()
                .namespace(namespace)
                .metric_data(datum)
                .send()
                .await
                .map_err(|e| ExportError::cloudwatch(e.to_string()))?;
            Ok(())
        }
    }
}
