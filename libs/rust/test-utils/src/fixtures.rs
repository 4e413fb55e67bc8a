//! Test fixtures with sample data.
//!
//! Validation-error documents in the shape upstream services return with a
//! `400 Bad Request`.

use serde_json::{Value, json};

/// Identity values used across client tests.
pub mod identity {
    /// Sample request id.
    pub const REQUEST_ID: &str = "3f1d2c9e-request";
    /// Sample AWS trace id.
    pub const TRACE_ID: &str = "Root=1-5759e988-bd862e3fe1be46a994272793";
    /// Sample session id.
    pub const SESSION_ID: &str = "session-42";
}

/// A document reporting two invalid fields.
#[must_use]
pub fn invalid_address() -> Value {
    json!({
        "valid": false,
        "errors": [
            {"context": "(root).address", "field": "address", "expected": "array", "given": "null"},
            {"context": "(root).city", "field": "city", "expected": "string", "given": "null"}
        ]
    })
}

/// A document reporting a valid payload.
#[must_use]
pub fn valid_document() -> Value {
    json!({ "valid": true })
}

/// An invalid document carrying its own message.
#[must_use]
pub fn invalid_with_message(message: &str) -> Value {
    json!({
        "valid": false,
        "message": message,
        "errors": [
            {"context": "(root).id", "field": "id", "expected": "integer", "given": "string"}
        ]
    })
}

/// A body that is not a validation document.
#[must_use]
pub const fn not_json() -> &'static str {
    "<html><body>Bad Request</body></html>"
}
