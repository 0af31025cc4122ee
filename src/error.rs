//! HTTP-facing error taxonomy.
//!
//! Every rejection produced by the gate (authentication, membership, quota)
//! and by the bundled handlers is a [`GateError`]. It renders as the JSON
//! envelope `{ "success": false, "error": "...", "code": "..." }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result alias for handlers and guards.
pub type GateResult<T> = Result<T, GateError>;

/// Structured rejection with a status code and a machine-readable reason.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    /// No usable credential (401).
    #[error("Not authenticated")]
    Unauthenticated,

    /// Identity backend unreachable or misbehaving (500).
    #[error("Authentication failed")]
    ProviderFault,

    /// Identity present but lacks a required capability (403).
    #[error("{message}")]
    Forbidden {
        reason: &'static str,
        message: String,
    },

    /// Rate limiter denial (429).
    #[error("{message}")]
    QuotaExceeded { message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Anything else. The message is user-facing, keep it generic.
    #[error("{0}")]
    Internal(String),
}

impl GateError {
    pub fn forbidden(reason: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden {
            reason,
            message: message.into(),
        }
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::ProviderFault => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GateError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason, when the variant carries one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            GateError::Forbidden { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// JSON body shared by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GateError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GateError::ProviderFault.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            GateError::forbidden("tier_required", "Upgrade required").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GateError::quota_exceeded("slow down").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_envelope_messages() {
        assert_eq!(GateError::Unauthenticated.to_string(), "Not authenticated");
        assert_eq!(GateError::ProviderFault.to_string(), "Authentication failed");
        assert_eq!(GateError::quota_exceeded("Too many login attempts").to_string(), "Too many login attempts");
    }

    #[tokio::test]
    async fn test_forbidden_body_carries_code() {
        let response = GateError::forbidden("tier_required", "Upgrade required").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Upgrade required");
        assert_eq!(json["code"], "tier_required");
    }

    #[tokio::test]
    async fn test_unauthenticated_body_has_no_code() {
        let response = GateError::Unauthenticated.into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "Not authenticated" }));
    }
}
