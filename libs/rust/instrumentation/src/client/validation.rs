//! Structured validation-error documents returned by upstream services.
//!
//! ```json
//! { "valid": false, "message": "optional",
//!   "errors": [{ "context": "(root).city", "field": "city",
//!                "expected": "string", "given": "null" }] }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Describes the validation failure of a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Location of the field in the document
    #[serde(default)]
    pub context: String,
    /// Field name
    #[serde(default)]
    pub field: String,
    /// Expected type or value
    #[serde(default)]
    pub expected: String,
    /// Received type or value
    #[serde(default)]
    pub given: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context: '{}' Error: Field validation for '{}' failed. Expected: {} but given: {}",
            self.context, self.field, self.expected, self.given
        )
    }
}

impl std::error::Error for FieldError {}

/// A validation-error document, itself usable as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// Whether the payload was valid
    #[serde(default)]
    pub valid: bool,
    /// Per-field failures
    #[serde(default)]
    pub errors: Vec<FieldError>,
    /// Message replacing the generated summary when non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationErrors {
    /// Parse a validation-error document.
    ///
    /// A non-empty `message` overrides both the document message and the
    /// generated summary.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `body` is not a validation document.
    pub fn parse(body: &[u8], message: &str) -> Result<Self, serde_json::Error> {
        let mut parsed: Self = serde_json::from_slice(body)?;
        if !message.is_empty() {
            parsed.message = Some(message.to_string());
        }
        Ok(parsed)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return f.write_str(message);
        }

        f.write_str("Validation Errors:")?;
        for field in &self.errors {
            write!(f, "\n{field}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "valid": false,
        "errors": [
            {"context": "(root).address", "expected": "array", "field": "address", "given": "null"},
            {"context": "(root).city", "expected": "string", "field": "city", "given": "null"}
        ],
        "item": 0
    }"#;

    #[test]
    fn test_field_error_message() {
        let err = FieldError {
            context: "(root).city".to_string(),
            field: "city".to_string(),
            expected: "string".to_string(),
            given: "null".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Context: '(root).city' Error: Field validation for 'city' failed. Expected: string but given: null"
        );
    }

    #[test]
    fn test_generated_summary() {
        let parsed = ValidationErrors::parse(DOCUMENT.as_bytes(), "").unwrap();
        assert!(!parsed.valid);
        assert_eq!(parsed.errors.len(), 2);

        let message = parsed.to_string();
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "Validation Errors:");
        assert!(lines[1].contains("'address'"));
        assert!(lines[2].contains("'city'"));
    }

    #[test]
    fn test_message_override() {
        let parsed = ValidationErrors::parse(DOCUMENT.as_bytes(), "Test").unwrap();
        assert_eq!(parsed.to_string(), "Test");
    }

    #[test]
    fn test_document_message_used_without_override() {
        let parsed = ValidationErrors::parse(br#"{"valid": false, "message": "bad address"}"#, "").unwrap();
        assert_eq!(parsed.to_string(), "bad address");
    }

    #[test]
    fn test_valid_document() {
        let parsed = ValidationErrors::parse(br#"{"valid": true}"#, "").unwrap();
        assert!(parsed.valid);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_not_json() {
        assert!(ValidationErrors::parse(b"<html>", "").is_err());
    }
}
