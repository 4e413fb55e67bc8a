//! Redis hash exporter.
//!
//! Each field is written as `HSET <store_key> <sender>/<field> <unix seconds>`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::export::Exporter;
use super::state::LastSeen;
use crate::error::ExportError;

/// Hash key used when none is configured.
pub const DEFAULT_STORE_KEY: &str = "eventbus-metrics";

/// Redis exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisExporterConfig {
    /// Connection URL, e.g. `redis://localhost:6379`
    pub url: String,
    /// Prefix of every hash field, usually the service name
    pub sender: String,
    /// Hash key
    pub store_key: String,
}

impl RedisExporterConfig {
    /// Configuration writing to the default hash.
    #[must_use]
    pub fn new(url: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sender: sender.into(),
            store_key: DEFAULT_STORE_KEY.to_string(),
        }
    }

    /// Write to `store_key`; an empty key keeps the default.
    #[must_use]
    pub fn with_store_key(mut self, store_key: impl Into<String>) -> Self {
        let store_key = store_key.into();
        if !store_key.is_empty() {
            self.store_key = store_key;
        }
        self
    }
}

/// Writes last-seen timestamps into a Redis hash.
#[derive(Clone)]
pub struct RedisExporter {
    conn: ConnectionManager,
    sender: String,
    store_key: String,
}

impl RedisExporter {
    /// Connect and verify the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Redis`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(config: RedisExporterConfig) -> Result<Self, ExportError> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(store_key = %config.store_key, "Connected last seen exporter to Redis");
        Ok(Self {
            conn,
            sender: config.sender,
            store_key: config.store_key,
        })
    }

    /// The hash field written for `field`.
    #[must_use]
    pub fn hash_field(&self, field: &str) -> String {
        hash_field(&self.sender, field)
    }
}

fn hash_field(sender: &str, field: &str) -> String {
    format!("{sender}/{field}")
}

impl std::fmt::Debug for RedisExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisExporter")
            .field("sender", &self.sender)
            .field("store_key", &self.store_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Exporter for RedisExporter {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(&self.store_key, self.hash_field(field), seen.value)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_key() {
        let config = RedisExporterConfig::new("redis://localhost", "billing");
        assert_eq!(config.store_key, "eventbus-metrics");
        assert_eq!(config.clone().with_store_key("").store_key, "eventbus-metrics");
        assert_eq!(config.with_store_key("liveness").store_key, "liveness");
    }

    #[test]
    fn test_hash_field() {
        assert_eq!(hash_field("billing", "invoice.paid"), "billing/invoice.paid");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = RedisExporter::connect(RedisExporterConfig::new("not-a-url", "svc")).await;
        assert!(matches!(result, Err(ExportError::Redis(_))));
    }
}
