//! Per-call request configuration.
//!
//! [`RequestOptions`] accumulates configuration; the client layers the
//! caller's options over its battery-included defaults, so a caller header
//! replaces a default header with the same (case-insensitive) name.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use serde::Serialize;

use super::fail::FailManager;
use crate::error::ClientError;
use crate::identity::Identity;
use crate::retry::RetryPolicy;

/// Options applied to a single call.
#[derive(Default, Clone)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    host: Option<String>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    fail_managers: Vec<Arc<dyn FailManager>>,
    invalid: Option<String>,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity propagation headers and the service user agent.
    #[must_use]
    pub fn battery_included(identity: &Identity, service_name: &str) -> Self {
        let mut options = Self::new();
        for (name, value) in identity.outbound_headers() {
            options = options.header(name, value);
        }
        if !service_name.is_empty() {
            options = options.user_agent(service_name);
        }
        options
    }

    /// Set a header. The last value for a name wins.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.header(USER_AGENT.as_str(), user_agent)
    }

    /// Override the outbound `Host` header; the connection target is unchanged.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the request payload. It is replayed on every attempt.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON payload and set `Content-Type`.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => self
                .body(body)
                .header(CONTENT_TYPE.as_str(), "application/json"),
            Err(e) => self.invalid(format!("unable to encode body: {e}")),
        }
    }

    /// Attach a fail manager, evaluated after the ones already attached.
    #[must_use]
    pub fn fail_on(mut self, manager: impl FailManager + 'static) -> Self {
        self.fail_managers.push(Arc::new(manager));
        self
    }

    /// Bound the whole call, retries included.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Perform up to `count` total attempts.
    #[must_use]
    pub const fn retry(mut self, count: u32) -> Self {
        self.retry = Some(RetryPolicy::attempts(count));
        self
    }

    /// Perform up to `count` total attempts with exponential backoff.
    #[must_use]
    pub const fn retry_with_backoff(mut self, count: u32, backoff: Duration) -> Self {
        self.retry = Some(RetryPolicy::with_backoff(count, backoff));
        self
    }

    fn invalid(mut self, reason: String) -> Self {
        self.invalid.get_or_insert(reason);
        self
    }

    /// Layer `overrides` on top of `self`.
    #[must_use]
    pub fn merge(mut self, overrides: Self) -> Self {
        self.headers.extend(overrides.headers);
        self.fail_managers.extend(overrides.fail_managers);
        self.body = overrides.body.or(self.body);
        self.host = overrides.host.or(self.host);
        self.retry = overrides.retry.or(self.retry);
        self.timeout = overrides.timeout.or(self.timeout);
        self.invalid = self.invalid.or(overrides.invalid);
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("host", &self.host)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("fail_managers", &self.fail_managers)
            .finish()
    }
}

/// A fully built request, immutable while executing.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    host: Option<HeaderValue>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    fail_managers: Vec<Arc<dyn FailManager>>,
}

impl Request {
    /// Build a request from accumulated options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] for a malformed URL, header
    /// name or header value.
    pub fn build(method: Method, url: &str, options: RequestOptions) -> Result<Self, ClientError> {
        if let Some(reason) = options.invalid {
            return Err(ClientError::InvalidRequest(reason));
        }

        let url = Url::parse(url)
            .map_err(|e| ClientError::invalid_request(format!("invalid url '{url}': {e}")))?;

        let mut headers = HeaderMap::new();
        for (key, value) in options.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ClientError::invalid_request(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ClientError::invalid_request(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let host = options
            .host
            .map(|host| {
                HeaderValue::from_str(&host)
                    .map_err(|e| ClientError::invalid_request(format!("invalid host '{host}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            method,
            url,
            headers,
            body: options.body,
            host,
            retry: options.retry.unwrap_or_default(),
            timeout: options.timeout,
            fail_managers: options.fail_managers,
        })
    }

    /// The HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Headers sent on every attempt.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `Host` override, if any.
    #[must_use]
    pub const fn host(&self) -> Option<&HeaderValue> {
        self.host.as_ref()
    }

    /// The payload, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The retry policy.
    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// The call deadline, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fail managers in evaluation order.
    #[must_use]
    pub fn fail_managers(&self) -> &[Arc<dyn FailManager>] {
        &self.fail_managers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fail::StatusChecker;
    use crate::identity::RequestContext;

    #[derive(Debug, thiserror::Error)]
    #[error("oops")]
    struct Oops;

    #[test]
    fn test_battery_included_headers() {
        let ctx = RequestContext::background()
            .with_request_id("request-id")
            .with_trace_id("Root=1-abc");
        let options = RequestOptions::battery_included(ctx.identity(), "ua-test");
        let request = Request::build(Method::GET, "http://localhost/", options).unwrap();

        assert_eq!(request.headers().get("x-request-id").unwrap(), "request-id");
        assert_eq!(request.headers().get("x-amzn-trace-id").unwrap(), "Root=1-abc");
        assert_eq!(request.headers().get(USER_AGENT).unwrap(), "ua-test");
        assert!(request.headers().get("x-session-id").is_none());
    }

    #[test]
    fn test_caller_overrides_defaults() {
        let ctx = RequestContext::background().with_request_id("from-context");
        let defaults = RequestOptions::battery_included(ctx.identity(), "svc");
        let caller = RequestOptions::new()
            .header("x-request-id", "from-caller")
            .user_agent("custom");

        let request = Request::build(Method::GET, "http://localhost/", defaults.merge(caller)).unwrap();
        assert_eq!(request.headers().get("X-Request-ID").unwrap(), "from-caller");
        assert_eq!(request.headers().get(USER_AGENT).unwrap(), "custom");
        assert_eq!(request.headers().get_all("x-request-id").iter().count(), 1);
    }

    #[test]
    fn test_last_header_wins() {
        let options = RequestOptions::new().header("X-A", "1").header("x-a", "2");
        let request = Request::build(Method::GET, "http://localhost/", options).unwrap();
        assert_eq!(request.headers().get("x-a").unwrap(), "2");
    }

    #[test]
    fn test_retry_and_timeout() {
        let options = RequestOptions::new()
            .retry_with_backoff(3, Duration::from_millis(50))
            .timeout(Duration::from_secs(1))
            .fail_on(StatusChecker::new(Oops, [500]))
            .fail_on(StatusChecker::new(Oops, [400]));
        let request = Request::build(Method::DELETE, "http://localhost/", options).unwrap();

        assert_eq!(request.retry(), RetryPolicy::with_backoff(3, Duration::from_millis(50)));
        assert_eq!(request.timeout(), Some(Duration::from_secs(1)));
        assert_eq!(request.fail_managers().len(), 2);
    }

    #[test]
    fn test_defaults_without_options() {
        let request = Request::build(Method::GET, "http://localhost/", RequestOptions::new()).unwrap();
        assert_eq!(request.retry(), RetryPolicy::none());
        assert_eq!(request.timeout(), None);
        assert!(request.body().is_none());
        assert!(request.host().is_none());
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_url = Request::build(Method::GET, "not a url", RequestOptions::new());
        assert!(matches!(bad_url, Err(ClientError::InvalidRequest(_))));

        let bad_header = Request::build(
            Method::GET,
            "http://localhost/",
            RequestOptions::new().header("bad header", "x"),
        );
        assert!(matches!(bad_header, Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn test_json_body() {
        let options = RequestOptions::new().json(&serde_json::json!({"id": 1337}));
        let request = Request::build(Method::POST, "http://localhost/", options).unwrap();
        assert_eq!(request.body().unwrap().as_ref(), br#"{"id":1337}"#);
        assert_eq!(request.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }
}
