//! The response envelope returned by the bridge.

use crate::timestamp_now;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Pending,
}

/// Stable, machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingFields,
    InvalidJson,
    AuthFailed,
    InvalidDirective,
    PermissionDenied,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingFields => "MISSING_FIELDS",
            Self::InvalidJson => "INVALID_JSON",
            Self::AuthFailed => "AUTH_FAILED",
            Self::InvalidDirective => "INVALID_DIRECTIVE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response envelope. Built fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralResponse {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub data: Option<Value>,
    pub timestamp: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl NeuralResponse {
    fn with_status(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code: None,
            data: None,
            timestamp: timestamp_now(),
            correlation_id: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Success, message)
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Pending, message)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            ..Self::with_status(ResponseStatus::Error, message)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_shape() {
        let resp = NeuralResponse::success("ok")
            .with_data(json!({"x": 1}))
            .with_correlation_id("corr");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "ok");
        assert_eq!(value["data"]["x"], 1);
        assert_eq!(value["correlation_id"], "corr");
        assert!(value.get("error_code").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn error_carries_code() {
        let resp = NeuralResponse::error(ErrorCode::PermissionDenied, "nope");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error_code"], "PERMISSION_DENIED");
        assert!(value["data"].is_null());
        assert!(value["correlation_id"].is_null());
    }

    #[test]
    fn codes_serialize_as_wire_names() {
        for code in [
            ErrorCode::MissingFields,
            ErrorCode::InvalidJson,
            ErrorCode::AuthFailed,
            ErrorCode::InvalidDirective,
            ErrorCode::PermissionDenied,
            ErrorCode::InternalError,
        ] {
            assert_eq!(
                serde_json::to_value(code).unwrap(),
                Value::String(code.as_str().to_string())
            );
        }
    }

    #[test]
    fn pending_status() {
        let resp = NeuralResponse::pending("queued");
        assert_eq!(resp.status, ResponseStatus::Pending);
        assert!(!resp.is_success());
    }
}
