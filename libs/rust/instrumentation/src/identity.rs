//! Request-scoped identity propagation.
//!
//! A [`RequestContext`] travels explicitly through call chains. It carries the
//! request, AWS trace and session identifiers of the inbound request together
//! with the caller's cancellation token.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Header used for tracing requests through AWS load balancers.
pub const AWS_TRACE_ID_HEADER: &str = "X-Amzn-Trace-Id";
/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "X-Session-ID";

/// Identifiers of the request being served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    request_id: Option<String>,
    trace_id: Option<String>,
    session_id: Option<String>,
}

impl Identity {
    /// Extract identifiers from inbound request headers.
    ///
    /// Missing, empty or non-UTF-8 headers are ignored.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            request_id: read(REQUEST_ID_HEADER),
            trace_id: read(AWS_TRACE_ID_HEADER),
            session_id: read(SESSION_ID_HEADER),
        }
    }

    /// The request identifier, if known.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The AWS trace identifier, if known.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// The session identifier, if known.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Assign a fresh request identifier when none was received.
    #[must_use]
    pub fn ensure_request_id(mut self) -> Self {
        if self.request_id.is_none() {
            self.request_id = Some(Uuid::new_v4().to_string());
        }
        self
    }

    /// Headers to forward on outbound calls, in a fixed order.
    #[must_use]
    pub fn outbound_headers(&self) -> Vec<(&'static str, &str)> {
        [
            (REQUEST_ID_HEADER, self.request_id()),
            (AWS_TRACE_ID_HEADER, self.trace_id()),
            (SESSION_ID_HEADER, self.session_id()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }

    /// Headers to echo back on the response to the inbound request.
    ///
    /// Only the trace and session identifiers are echoed.
    #[must_use]
    pub fn echo_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (AWS_TRACE_ID_HEADER, self.trace_id()),
            (SESSION_ID_HEADER, self.session_id()),
        ] {
            let name = HeaderName::from_bytes(name.as_bytes());
            let value = value.map(HeaderValue::from_str);
            if let (Ok(name), Some(Ok(value))) = (name, value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

/// Explicit request-scoped context.
///
/// Cloning is cheap; clones share the same cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identity: Identity,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// A context without identity that is never cancelled unless asked to.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Build a context for an inbound request from its headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::background().with_identity(Identity::from_headers(headers))
    }

    /// Replace the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Store the request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.identity.request_id = Some(request_id.into());
        self
    }

    /// Store the AWS trace identifier.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.identity.trace_id = Some(trace_id.into());
        self
    }

    /// Store the session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.identity.session_id = Some(session_id.into());
        self
    }

    /// Tie this context to an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The identity carried by this context.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The caller's cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        headers.insert("x-amzn-trace-id", HeaderValue::from_static("Root=1-abc"));
        headers.insert("x-session-id", HeaderValue::from_static(""));

        let identity = Identity::from_headers(&headers);
        assert_eq!(identity.request_id(), Some("req-1"));
        assert_eq!(identity.trace_id(), Some("Root=1-abc"));
        assert_eq!(identity.session_id(), None);
    }

    #[test]
    fn test_missing_values_are_none() {
        let ctx = RequestContext::background();
        assert_eq!(ctx.identity().request_id(), None);
        assert_eq!(ctx.identity().session_id(), None);
        assert!(ctx.identity().outbound_headers().is_empty());
    }

    #[test]
    fn test_outbound_headers_only_present_values() {
        let ctx = RequestContext::background()
            .with_request_id("req-1")
            .with_session_id("sess-9");

        assert_eq!(
            ctx.identity().outbound_headers(),
            vec![(REQUEST_ID_HEADER, "req-1"), (SESSION_ID_HEADER, "sess-9")]
        );
    }

    #[test]
    fn test_echo_headers() {
        let ctx = RequestContext::background()
            .with_request_id("req-1")
            .with_trace_id("Root=1-abc")
            .with_session_id("sess-9");

        let echoed = ctx.identity().echo_headers();
        assert_eq!(echoed.len(), 2);
        assert_eq!(echoed.get(AWS_TRACE_ID_HEADER).unwrap(), "Root=1-abc");
        assert_eq!(echoed.get(SESSION_ID_HEADER).unwrap(), "sess-9");
        assert!(echoed.get(REQUEST_ID_HEADER).is_none());
    }

    #[test]
    fn test_ensure_request_id() {
        let identity = Identity::default().ensure_request_id();
        assert!(identity.request_id().is_some_and(|id| id.len() == 36));

        let kept = Identity::from_headers(&HeaderMap::new())
            .ensure_request_id()
            .ensure_request_id();
        assert!(kept.request_id().is_some());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = RequestContext::background();
        let clone = ctx.clone();
        clone.cancel();
        assert!(ctx.is_cancelled());
    }
}
