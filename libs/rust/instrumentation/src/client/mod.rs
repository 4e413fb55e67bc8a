//! Instrumented outbound HTTP client.
//!
//! Every call carries the caller's identity headers and service user agent,
//! runs its attempts on a detached task, and races that task against the
//! call deadline. When the deadline or the caller's cancellation fires first
//! the call returns [`ClientError::Timeout`]; the detached task keeps running
//! until its current attempt finishes and releases whatever it produced.

mod fail;
mod request;
mod response;
mod validation;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HOST;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, warn};

pub use fail::{FailManager, HasValidationErrors, StatusChecker};
pub use request::{Request, RequestOptions};
pub use response::{Body, Response};
pub use validation::{FieldError, ValidationErrors};

use crate::error::ClientError;
use crate::http::{HttpConfig, build_http_client};
use crate::identity::RequestContext;
use crate::metrics::ClientMetrics;
use crate::span::client_span;
use response::DeadlineGuard;

const METRICS_PREFIX: &str = "instrumentation";

struct Inner {
    http: reqwest::Client,
    config: HttpConfig,
    span_name: String,
    metrics: ClientMetrics,
}

/// Instrumented HTTP client. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self, ClientError> {
        let http = build_http_client(&config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                span_name: config.span_name(),
                config,
                metrics: ClientMetrics::new(METRICS_PREFIX),
            }),
        })
    }

    /// Create a client configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(HttpConfig::from_env())
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    /// Client metrics.
    #[must_use]
    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    /// Issue a `GET`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn get(
        &self,
        ctx: &RequestContext,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        self.execute(ctx, Method::GET, url, options).await
    }

    /// Issue a `POST`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn post(
        &self,
        ctx: &RequestContext,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        self.execute(ctx, Method::POST, url, options).await
    }

    /// Issue a `PUT`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn put(
        &self,
        ctx: &RequestContext,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        self.execute(ctx, Method::PUT, url, options).await
    }

    /// Issue a `DELETE`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        self.execute(ctx, Method::DELETE, url, options).await
    }

    /// Build a request from the battery-included defaults overlaid with
    /// `options`, then send it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] if the request cannot be
    /// built, otherwise see [`Client::send`].
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let defaults = RequestOptions::battery_included(ctx.identity(), &self.inner.config.service_name);
        let request = Request::build(method, url, defaults.merge(options))?;
        self.send(ctx, request).await
    }

    /// Send a built request.
    ///
    /// The caller must close (or drop) the returned response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NoRuntime`] when polled outside a Tokio runtime
    /// - [`ClientError::Timeout`] if the deadline elapses or `ctx` is
    ///   cancelled before a result is delivered
    /// - the last transport error or fail manager rejection once attempts
    ///   are exhausted
    pub async fn send(&self, ctx: &RequestContext, request: Request) -> Result<Response, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let metrics = &self.inner.metrics;
        metrics.requests.inc();

        let deadline = ctx.cancellation().child_token();
        let guard = request
            .timeout()
            .map(|timeout| self.start_deadline(&runtime, timeout, deadline.clone()));

        let (tx, rx) = oneshot::channel();
        let request = Arc::new(request);
        let task = Attempts {
            inner: Arc::clone(&self.inner),
            request: Arc::clone(&request),
            deadline: deadline.clone(),
        };
        runtime.spawn(
            async move {
                let mut result = task.run().await;
                if let (Ok(response), Some(guard)) = (result.as_mut(), guard) {
                    response.attach_deadline(guard);
                }
                // A closed channel means the caller gave up; dropping the
                // result releases the body and the deadline.
                let _ = tx.send(result);
            }
            .in_current_span(),
        );

        let result = tokio::select! {
            biased;
            () = deadline.cancelled() => Err(ClientError::Timeout),
            delivered = rx => delivered.unwrap_or(Err(ClientError::Aborted)),
        };

        match &result {
            Ok(response) => debug!(
                method = %request.method(),
                url = %request.url(),
                status = response.status_code(),
                "Request completed"
            ),
            Err(ClientError::Timeout) => {
                metrics.timeouts.inc();
                warn!(method = %request.method(), url = %request.url(), "Request timed out");
            }
            Err(err) => {
                metrics.failures.inc();
                warn!(method = %request.method(), url = %request.url(), error = %err, "Request failed");
            }
        }
        result
    }

    /// Arm the deadline timer. The returned guard stops it when released.
    fn start_deadline(
        &self,
        runtime: &Handle,
        timeout: Duration,
        deadline: CancellationToken,
    ) -> DeadlineGuard {
        let release = CancellationToken::new();
        let guard = DeadlineGuard::new(release.clone());
        let inner = Arc::clone(&self.inner);

        inner.metrics.active_deadlines.inc();
        runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => deadline.cancel(),
                () = deadline.cancelled() => {}
                () = release.cancelled() => {}
            }
            inner.metrics.active_deadlines.dec();
        });
        guard
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// The retry loop of one call, owned by the detached task.
struct Attempts {
    inner: Arc<Inner>,
    request: Arc<Request>,
    deadline: CancellationToken,
}

impl Attempts {
    async fn run(&self) -> Result<Response, ClientError> {
        self.request
            .retry()
            .execute_while(|attempt| self.attempt(attempt), |err| !err.is_timeout())
            .await
    }

    async fn attempt(&self, attempt: u32) -> Result<Response, ClientError> {
        if self.deadline.is_cancelled() {
            return Err(ClientError::Timeout);
        }

        let request = &self.request;
        let span = client_span(
            &self.inner.span_name,
            request.method(),
            request.url().as_str(),
            attempt,
        );
        self.issue(attempt).instrument(span).await
    }

    /// One network call followed by the fail managers.
    async fn issue(&self, attempt: u32) -> Result<Response, ClientError> {
        let request = &self.request;
        self.inner.metrics.attempts.inc();

        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(host) = request.host() {
            builder = builder.header(HOST, host.clone());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let sent = tokio::select! {
            biased;
            () = self.deadline.cancelled() => return Err(ClientError::Timeout),
            sent = builder.send() => sent?,
        };
        Span::current().record("http.status_code", sent.status().as_u16());

        let mut response = Response::from_reqwest(sent);
        for manager in request.fail_managers() {
            if let Err(err) = manager.check(&mut response).await {
                debug!(attempt, error = %err, "Response rejected");
                response.discard().await;
                return Err(err);
            }
        }
        Ok(response)
    }
}
