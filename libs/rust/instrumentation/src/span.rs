//! Distributed tracing spans.

use std::collections::BTreeMap;

use reqwest::Method;
use tracing::{Span, field::Empty, info_span};

use crate::identity::RequestContext;

/// Fields to include in a span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanOptions {
    /// Optional namespace prefixed to the label
    pub namespace: Option<String>,
    /// String tags
    pub string_tags: BTreeMap<String, String>,
    /// Integer tags
    pub int64_tags: BTreeMap<String, i64>,
    label: String,
}

impl SpanOptions {
    /// Options for a span with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Set the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add a string tag. Later values win for the same key.
    #[must_use]
    pub fn string_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_tags.insert(key.into(), value.into());
        self
    }

    /// Add an integer tag. Later values win for the same key.
    #[must_use]
    pub fn int64_tag(mut self, key: impl Into<String>, value: i64) -> Self {
        self.int64_tags.insert(key.into(), value);
        self
    }

    /// The label the span is exported under: `namespace::label` or `label`.
    #[must_use]
    pub fn span_label(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}::{}", self.label),
            _ => self.label.clone(),
        }
    }
}

/// A started span. Ending or dropping it closes the span.
#[derive(Debug)]
pub struct ActiveSpan {
    span: Span,
}

impl ActiveSpan {
    /// The underlying span, for `Instrument::instrument` or `in_scope`.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Close the span.
    pub fn end(self) {
        drop(self);
    }
}

/// Start a span for a unit of work within a request.
#[must_use]
pub fn start_span(ctx: &RequestContext, options: &SpanOptions) -> ActiveSpan {
    let span = info_span!(
        "span",
        otel.name = %options.span_label(),
        request_id = ctx.identity().request_id().unwrap_or_default(),
        string_tags = Empty,
        int64_tags = Empty
    );
    if !options.string_tags.is_empty() {
        span.record("string_tags", tracing::field::debug(&options.string_tags));
    }
    if !options.int64_tags.is_empty() {
        span.record("int64_tags", tracing::field::debug(&options.int64_tags));
    }
    ActiveSpan { span }
}

/// Client span wrapping one outbound HTTP attempt.
pub(crate) fn client_span(name: &str, method: &Method, url: &str, attempt: u32) -> Span {
    info_span!(
        "http.client",
        otel.name = %name,
        otel.kind = "client",
        http.method = %method,
        http.url = %url,
        http.attempt = attempt,
        http.status_code = Empty
    )
}
