//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Protocol-level
//! problems inside a session never surface here; they are answered in-band
//! on the socket. This enum covers infrastructure failures: the registry
//! going away, bad configuration and I/O failures. Socket errors end the
//! affected session only and are classified with [`is_peer_closing`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "revision registry is unavailable"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The registry actor has stopped and no longer answers requests.
    #[error("revision registry is unavailable")]
    RegistryUnavailable,

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O failure while binding or serving.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::Io(_) => 3000,
            Self::RegistryUnavailable => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RegistryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidConfig(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Returns `true` when a socket error means the peer connection is already
/// closing or gone, as opposed to a transient failure on a single frame.
#[must_use]
pub fn is_peer_closing(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("closed") || text.contains("closing") {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_unavailable_is_service_unavailable() {
        let err = GatewayError::RegistryUnavailable;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), 3001);
    }

    #[test]
    fn into_response_carries_status() {
        let response = GatewayError::InvalidConfig("LISTEN_ADDR".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorResponse {
            error: ErrorBody {
                code: GatewayError::RegistryUnavailable.error_code(),
                message: GatewayError::RegistryUnavailable.to_string(),
            },
        };
        let json = serde_json::to_value(&body).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({
                "error": { "code": 3001, "message": "revision registry is unavailable" }
            }))
        );
    }

    #[test]
    fn broken_pipe_counts_as_closing() {
        let err = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(is_peer_closing(&err));
    }

    #[test]
    fn closed_connection_message_counts_as_closing() {
        let err = std::io::Error::other("Trying to work with closed connection");
        assert!(is_peer_closing(&err));
    }

    #[test]
    fn other_failures_are_not_closing() {
        let err = std::io::Error::other("frame too large");
        assert!(!is_peer_closing(&err));
    }
}
