use serde::{Deserialize, Serialize};

/// Structured failure payload returned across the run-controller boundary.
/// Carries enough information for an operator or a calling service to tell
/// what failed and whether retrying makes sense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl ErrorReport {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            field: None,
            received: None,
            docs_hint: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_received(mut self, received: serde_json::Value) -> Self {
        self.received = Some(received);
        self
    }

    pub fn with_docs_hint(mut self, hint: impl Into<String>) -> Self {
        self.docs_hint = Some(hint.into());
        self
    }
}

/// Error codes used across the engine
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const EVIDENCE_TIMEOUT: &str = "evidence_timeout";
    pub const PROVIDER_FAILED: &str = "provider_failed";
    pub const CONFIG_INVALID: &str = "config_invalid";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Alert registry misses and rejected mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlertError {
    #[error("alert '{0}' not found")]
    NotFound(String),
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl AlertError {
    pub fn code(&self) -> &'static str {
        match self {
            AlertError::NotFound(_) => codes::NOT_FOUND,
            AlertError::Validation { .. } => codes::VALIDATION_FAILED,
        }
    }
}

impl From<&AlertError> for ErrorReport {
    fn from(err: &AlertError) -> Self {
        let report = ErrorReport::new(err.code(), err.to_string());
        match err {
            AlertError::NotFound(id) => report
                .with_field("alert_id")
                .with_received(serde_json::Value::String(id.clone())),
            AlertError::Validation { field, .. } => report.with_field(*field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_absent_optional_fields() {
        let report = ErrorReport::new(codes::INTERNAL_ERROR, "boom");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "boom");
        assert!(json.get("field").is_none());
        assert!(json.get("docs_hint").is_none());
    }

    #[test]
    fn alert_not_found_maps_to_report_with_received_id() {
        let err = AlertError::NotFound("alert_123".to_string());
        let report = ErrorReport::from(&err);
        assert_eq!(report.error, codes::NOT_FOUND);
        assert_eq!(report.field.as_deref(), Some("alert_id"));
        assert_eq!(
            report.received,
            Some(serde_json::Value::String("alert_123".to_string()))
        );
    }

    #[test]
    fn validation_error_names_field() {
        let err = AlertError::Validation {
            field: "notes",
            message: "must be at least 10 characters".to_string(),
        };
        assert_eq!(err.code(), codes::VALIDATION_FAILED);
        assert_eq!(
            err.to_string(),
            "invalid notes: must be at least 10 characters"
        );
    }
}
