use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Missing or malformed client input. Never forwarded upstream.
    BadRequest(String),
    /// Upstream rejected the credentials (HTTP 401).
    UpstreamAuth {
        /// Response body, when the upstream sent one.
        body: Option<Value>,
    },
    /// Any other non-success upstream response, transport failure or timeout.
    Upstream {
        /// Upstream status code; `None` for timeouts and connection errors.
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },
    /// No token issuance candidate succeeded.
    TokenIssuance(String),
    /// Internal server error.
    Internal(String),
}

impl AppError {
    /// Builds the error for a non-success upstream status.
    pub fn from_upstream_status(status: u16, body: Option<Value>) -> Self {
        if status == StatusCode::UNAUTHORIZED.as_u16() {
            return AppError::UpstreamAuth { body };
        }
        AppError::Upstream {
            status: Some(status),
            message: format!("Request failed with status code {}", status),
            body,
        }
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, AppError::UpstreamAuth { .. })
    }

    /// Upstream status observed for this failure, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::UpstreamAuth { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            AppError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Upstream response body observed for this failure, if any.
    pub fn upstream_body(&self) -> Option<&Value> {
        match self {
            AppError::UpstreamAuth { body } | AppError::Upstream { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// HTTP status to answer the caller with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamAuth { .. } | AppError::Upstream { .. } => self
                .upstream_status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::TokenIssuance(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Caller-facing message. Prefers the upstream's own `message` field.
    pub fn public_message(&self) -> String {
        if let Some(message) = self
            .upstream_body()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::UpstreamAuth { .. } => "Request failed with status code 401".to_string(),
            AppError::Upstream { message, .. } => message.clone(),
            AppError::TokenIssuance(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::UpstreamAuth { .. } => write!(f, "Upstream rejected credentials (401)"),
            AppError::Upstream {
                status: Some(status),
                message,
                ..
            } => write!(f, "Upstream error {}: {}", status, message),
            AppError::Upstream {
                status: None,
                message,
                ..
            } => write!(f, "Upstream error: {}", message),
            AppError::TokenIssuance(msg) => write!(f, "Token issuance failed: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// The `{success:false, ...}` body the front-end expects.
    pub fn response_body(&self) -> Value {
        match self {
            AppError::BadRequest(msg) => json!({
                "success": false,
                "message": msg,
            }),
            AppError::UpstreamAuth { body } | AppError::Upstream { body, .. } => json!({
                "success": false,
                "message": self.public_message(),
                "error": body,
            }),
            AppError::TokenIssuance(_) | AppError::Internal(_) => json!({
                "success": false,
                "message": "Error al procesar la cotización",
            }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::BadRequest(_) => {}
            AppError::UpstreamAuth { .. } | AppError::Upstream { .. } => {
                tracing::error!("Upstream failure surfaced to caller: {}", self);
            }
            AppError::TokenIssuance(msg) | AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
            }
        }

        (self.status_code(), Json(self.response_body())).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Transport failures carry no upstream status.
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Upstream request timed out: {}", err)
        } else {
            err.to_string()
        };
        AppError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message,
            body: None,
        }
    }
}
