//! Shared instrumentation for HTTP services.
//!
//! This crate provides:
//! - Request identity propagation (request id, AWS trace id, session id)
//! - An instrumented outbound HTTP client with deadlines, retries and
//!   pluggable fail managers
//! - A debounced last-seen liveness tracker with Redis and CloudWatch
//!   exporters
//! - Tracing setup, request-scoped log spans and custom spans
//! - Prometheus metrics helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod http;
pub mod identity;
pub mod lastseen;
pub mod logs;
pub mod metrics;
pub mod retry;
pub mod span;
pub mod tracing_config;

pub use client::{
    Body, Client, FailManager, FieldError, HasValidationErrors, Request, RequestOptions, Response,
    StatusChecker, ValidationErrors,
};
pub use error::{BoxError, ClientError, ConfigError, ExportError, TrackerError};
pub use http::{HttpConfig, build_http_client};
pub use identity::{Identity, RequestContext};
pub use lastseen::{Tracker, TrackerCell, TrackerConfig};
pub use retry::RetryPolicy;
pub use span::{SpanOptions, start_span};
pub use tracing_config::{TracingConfig, init_tracing};
