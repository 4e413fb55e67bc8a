//! Exporter seam and fan-out composition.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::state::LastSeen;
use crate::error::ExportError;

/// A sink for last-seen observations.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Publish that `field` was seen at `seen.value`.
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError>;
}

#[async_trait]
impl<E: Exporter + ?Sized> Exporter for Box<E> {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        (**self).export(field, seen).await
    }
}

#[async_trait]
impl<E: Exporter + ?Sized> Exporter for Arc<E> {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        (**self).export(field, seen).await
    }
}

/// Deferred exporter construction, run once while the tracker is built.
pub type ExporterFactory =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<Box<dyn Exporter>, ExportError>> + Send>;

/// Box an async constructor into an [`ExporterFactory`].
pub fn factory<F, Fut, E>(build: F) -> ExporterFactory
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<E, ExportError>> + Send + 'static,
    E: Exporter + 'static,
{
    Box::new(move || {
        Box::pin(async move {
            let exporter = build().await?;
            Ok(Box::new(exporter) as Box<dyn Exporter>)
        })
    })
}

/// Fans one export out to several exporters, in order.
///
/// The first failure stops the fan-out; later exporters are skipped for
/// that export.
#[derive(Default)]
pub struct Multi {
    exporters: Vec<Box<dyn Exporter>>,
}

impl Multi {
    /// An empty fan-out, which accepts every export.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exporter.
    #[must_use]
    pub fn with(mut self, exporter: impl Exporter + 'static) -> Self {
        self.push(Box::new(exporter));
        self
    }

    /// Append an exporter.
    pub fn push(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.push(exporter);
    }

    /// Append the exporters of another fan-out, flattening it.
    pub fn append(&mut self, other: Self) {
        self.exporters.extend(other.exporters);
    }

    /// Number of exporters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    /// Whether no exporter is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

impl FromIterator<Box<dyn Exporter>> for Multi {
    fn from_iter<I: IntoIterator<Item = Box<dyn Exporter>>>(iter: I) -> Self {
        Self {
            exporters: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for Multi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multi")
            .field("exporters", &self.exporters.len())
            .finish()
    }
}

#[async_trait]
impl Exporter for Multi {
    async fn export(&self, field: &str, seen: LastSeen) -> Result<(), ExportError> {
        for exporter in &self.exporters {
            exporter.export(field, seen).await?;
        }
        Ok(())
    }
}
