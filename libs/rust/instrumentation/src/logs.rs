//! Request-scoped structured logging.
//!
//! Log lines emitted inside [`span`] carry the service name, request id and
//! session id of the request being served.

use tracing::{Span, field::Empty, info_span};

use crate::http::service_name_from_env;
use crate::identity::RequestContext;

/// Open a logging span for the given request context.
///
/// Fields are only recorded when a value is known.
#[must_use]
pub fn span(ctx: &RequestContext) -> Span {
    let span = info_span!(
        "request",
        service = Empty,
        request_id = Empty,
        session_id = Empty
    );

    let service = service_name_from_env();
    if !service.is_empty() {
        span.record("service", service.as_str());
    }
    if let Some(request_id) = ctx.identity().request_id() {
        span.record("request_id", request_id);
    }
    if let Some(session_id) = ctx.identity().session_id() {
        span.record("session_id", session_id);
    }
    span
}

/// Mask a social security number, keeping the last four characters.
///
/// # Examples
///
/// ```
/// use rust_instrumentation::logs::mask_ssn;
///
/// assert_eq!(mask_ssn("199001011234"), "********1234");
/// assert_eq!(mask_ssn("12"), "****");
/// ```
#[must_use]
pub fn mask_ssn(ssn: &str) -> String {
    let chars: Vec<char> = ssn.chars().collect();
    if chars.len() < 4 {
        return "****".to_string();
    }

    let (masked, suffix) = chars.split_at(chars.len() - 4);
    let mut out = "*".repeat(masked.len());
    out.extend(suffix);
    out
}
