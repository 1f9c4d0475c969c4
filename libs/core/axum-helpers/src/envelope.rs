//! The JSON response envelope shared by every API endpoint.
//!
//! Success and error bodies both use the same shape so clients can parse
//! responses uniformly:
//!
//! ```json
//! {"status": "success", "message": "GitHub disconnected", "data": {...}}
//! {"status": "error", "message": "Authentication required"}
//! ```

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Standard response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success envelope carrying a payload.
    pub fn success(data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: None,
            data: Some(data),
        }
    }

    /// Success envelope carrying both a message and a payload.
    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<serde_json::Value> {
    /// Success envelope carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Error envelope carrying only a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Build an error response with the given status code and message.
pub fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let body = ApiResponse::success(serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["id"], 1);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = ApiResponse::error("boom");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_message_envelope_shape() {
        let body = ApiResponse::message("done");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "done");
    }
}
