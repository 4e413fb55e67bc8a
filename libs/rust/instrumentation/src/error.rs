//! Centralized error types for the instrumentation library.
//!
//! Request-time failures are always returned as values: the outbound client
//! yields [`ClientError`], exporters yield [`ExportError`] (which the tracker
//! only logs), and setup-time problems surface as [`ConfigError`] or
//! [`TrackerError`].

use std::sync::Arc;

use thiserror::Error;

use crate::client::ValidationErrors;

/// A shareable, type-erased error supplied by callers to fail managers.
///
/// The same value is re-raised on every rejected attempt, hence the `Arc`.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the instrumented HTTP client.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The request deadline elapsed, or the caller cancelled, before a result
    /// was delivered.
    #[error("Timeout")]
    Timeout,

    /// Network level failure (DNS, connection refused, protocol error).
    #[error("HTTP request failed: {0}")]
    Transport(Arc<reqwest::Error>),

    /// A fail manager rejected the response with the caller's error.
    #[error("{0}")]
    Rejected(BoxError),

    /// The response carried a structured validation-error document.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A 400 body could not be read or parsed as a validation document.
    #[error("{rejection}: {reason}")]
    UnreadableValidation {
        /// The error the fail manager was configured with
        rejection: BoxError,
        /// Why the body could not be interpreted
        reason: String,
    },

    /// The request could not be built from the supplied options.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be decoded.
    #[error("Unable to decode body: {0}")]
    Decode(String),

    /// The retry task stopped without delivering a result.
    #[error("Request task aborted")]
    Aborted,

    /// The request was sent outside of a Tokio runtime.
    #[error("HTTP client requires a Tokio runtime")]
    NoRuntime,
}

impl ClientError {
    /// Wrap a caller supplied error so it can be used as a rejection.
    #[must_use]
    pub fn rejected<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Rejected(Arc::new(err))
    }

    /// Create an invalid request error with the given message.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Whether this is the timeout sentinel.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// The caller-declared error behind a fail manager rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&BoxError> {
        match self {
            Self::Rejected(err) | Self::UnreadableValidation { rejection: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Downcast the rejection to a concrete caller error type.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_instrumentation::ClientError;
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("upstream exploded")]
    /// struct Upstream;
    ///
    /// let err = ClientError::rejected(Upstream);
    /// assert!(err.downcast_ref::<Upstream>().is_some());
    /// assert!(ClientError::Timeout.downcast_ref::<Upstream>().is_none());
    /// ```
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.rejection().and_then(|err| err.downcast_ref::<E>())
    }

    /// The structured validation errors, if the response carried any.
    #[must_use]
    pub const fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

/// Errors produced by last-seen exporters.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Metrics service rejected the data point
    #[error("CloudWatch error: {0}")]
    CloudWatch(String),

    /// Exporter factory could not build its exporter
    #[error("Exporter factory failed: {0}")]
    Factory(String),
}

impl ExportError {
    /// Create a CloudWatch error with the given message.
    #[must_use]
    pub fn cloudwatch(msg: impl Into<String>) -> Self {
        Self::CloudWatch(msg.into())
    }

    /// Create a factory error with the given message.
    #[must_use]
    pub fn factory(msg: impl Into<String>) -> Self {
        Self::Factory(msg.into())
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The flush interval string is not an integer number of seconds
    #[error("Invalid flush interval '{value}': {reason}")]
    InvalidFlushInterval {
        /// The rejected input
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Errors raised while constructing a tracker.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// One of the exporter factories failed
    #[error("Unable to create last seen exporter: {0}")]
    Exporter(#[from] ExportError),

    /// The tracker was built outside of a Tokio runtime
    #[error("Last seen tracker requires a Tokio runtime")]
    NoRuntime,
}
