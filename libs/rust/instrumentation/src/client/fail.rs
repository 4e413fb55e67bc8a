//! Fail managers decide whether a response counts as a failure.
//!
//! Managers attached to a request run in attachment order; the first
//! rejection wins and is what the retry loop sees.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::response::Response;
use super::validation::ValidationErrors;
use crate::error::{BoxError, ClientError};

/// A failure handler over responses.
#[async_trait]
pub trait FailManager: Send + Sync + fmt::Debug {
    /// Accept the response with `Ok(())` or reject it with an error.
    ///
    /// Implementations that read the body must leave it readable.
    async fn check(&self, response: &mut Response) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
enum Statuses {
    List(Vec<u16>),
    Range(RangeInclusive<u16>),
}

impl Statuses {
    fn contains(&self, status: u16) -> bool {
        match self {
            Self::List(list) => list.contains(&status),
            Self::Range(range) => range.contains(&status),
        }
    }
}

/// Rejects responses based on status membership.
#[derive(Clone)]
pub struct StatusChecker {
    statuses: Statuses,
    error: BoxError,
    must_contain: bool,
}

impl StatusChecker {
    /// Fail with `error` when the status is one of `statuses`.
    pub fn new<E, I>(error: E, statuses: I) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        I: IntoIterator<Item = u16>,
    {
        Self {
            statuses: Statuses::List(statuses.into_iter().collect()),
            error: Arc::new(error),
            must_contain: false,
        }
    }

    /// Fail with `error` when `min <= status <= max`.
    pub fn between<E>(error: E, min: u16, max: u16) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            statuses: Statuses::Range(min..=max),
            error: Arc::new(error),
            must_contain: false,
        }
    }

    /// Fail with `error` unless the status is one of `statuses`.
    pub fn is_not<E, I>(error: E, statuses: I) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        I: IntoIterator<Item = u16>,
    {
        Self {
            statuses: Statuses::List(statuses.into_iter().collect()),
            error: Arc::new(error),
            must_contain: true,
        }
    }

    /// Evaluate a bare status code.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] carrying the configured error.
    pub fn check_status(&self, status: u16) -> Result<(), ClientError> {
        if self.statuses.contains(status) == self.must_contain {
            Ok(())
        } else {
            Err(ClientError::Rejected(Arc::clone(&self.error)))
        }
    }
}

impl fmt::Debug for StatusChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusChecker")
            .field("statuses", &self.statuses)
            .field("error", &self.error.to_string())
            .field("must_contain", &self.must_contain)
            .finish()
    }
}

#[async_trait]
impl FailManager for StatusChecker {
    async fn check(&self, response: &mut Response) -> Result<(), ClientError> {
        self.check_status(response.status_code())
    }
}

/// Detects validation-error documents on `400 Bad Request` responses.
///
/// Other statuses pass untouched. On a 400 the body is read in full and put
/// back on the response before parsing.
#[derive(Clone)]
pub struct HasValidationErrors {
    error: BoxError,
    message: String,
}

impl HasValidationErrors {
    /// Reject with the parsed validation errors, or with `error` when the
    /// body cannot be read or parsed.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            error: Arc::new(error),
            message: String::new(),
        }
    }

    /// Replace the generated summary with `message` when it is non-empty.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn unreadable(&self, reason: String) -> ClientError {
        ClientError::UnreadableValidation {
            rejection: Arc::clone(&self.error),
            reason,
        }
    }
}

impl fmt::Debug for HasValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasValidationErrors")
            .field("error", &self.error.to_string())
            .field("message", &self.message)
            .finish()
    }
}

#[async_trait]
impl FailManager for HasValidationErrors {
    async fn check(&self, response: &mut Response) -> Result<(), ClientError> {
        if response.status() != StatusCode::BAD_REQUEST {
            return Ok(());
        }

        let body = response
            .buffer_body()
            .await
            .map_err(|e| self.unreadable(format!("failed to read body: {e}")))?;

        let parsed = ValidationErrors::parse(&body, &self.message)
            .map_err(|e| self.unreadable(format!("failed to parse validation errors: {e}")))?;

        if parsed.valid {
            Ok(())
        } else {
            Err(ClientError::Validation(parsed))
        }
    }
}
