//! Centralized HTTP client configuration and building.
//!
//! The underlying `reqwest` client deliberately carries no request timeout:
//! deadlines are per request, see [`crate::client::RequestOptions::timeout`].

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Environment variable holding the ambient service name.
pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Name of the calling service, used as default `User-Agent` and span name
    pub service_name: String,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
        }
    }
}

impl HttpConfig {
    /// Build a config whose service name comes from `SERVICE_NAME`.
    ///
    /// A `.env` file is honoured when present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default().with_service_name(service_name_from_env())
    }

    /// Create a new HTTP config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create a new HTTP config with custom connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom pool settings.
    #[must_use]
    pub const fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Name of the client span emitted for each outbound attempt.
    #[must_use]
    pub fn span_name(&self) -> String {
        format!("from {}", self.service_name)
    }
}

/// Read the ambient service name, empty when unset.
#[must_use]
pub fn service_name_from_env() -> String {
    std::env::var(SERVICE_NAME_ENV).unwrap_or_default()
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
///
/// # Examples
///
/// ```
/// use rust_instrumentation::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default()
///     .with_connect_timeout(Duration::from_secs(2));
/// let client = build_http_client(&config).expect("Failed to build client");
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .use_rustls_tls()
        .build()
}
