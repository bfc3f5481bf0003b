//! Mapping edge outcomes onto HTTP responses.
//!
//! # Responsibilities
//! - Map each denial kind to its status code
//! - Attach `Retry-After` to rate-limit denials
//! - Keep cipher failures detail-free on the wire
//!
//! # Design Decisions
//! - Token problems are 401 (re-issue and retry), scope and abuse
//!   denials are 403, cipher failures are a plain 500

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::ProtectError;

impl ProtectError {
    /// HTTP status equivalent of this denial.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProtectError::Malformed
            | ProtectError::Expired
            | ProtectError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ProtectError::InvalidTtl => StatusCode::BAD_REQUEST,
            ProtectError::InsufficientScope | ProtectError::AbuseDetected { .. } => {
                StatusCode::FORBIDDEN
            }
            ProtectError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProtectError::DecryptionFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ProtectError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProtectError {
    fn into_response(self) -> Response {
        // Cipher internals never reach the client.
        let body = match &self {
            ProtectError::DecryptionFailure => "stream unavailable".to_string(),
            other => other.to_string(),
        };

        let mut response = (self.status_code(), body).into_response();
        if let ProtectError::RateLimited { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::abuse::AbuseReason;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProtectError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProtectError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProtectError::InsufficientScope.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProtectError::AbuseDetected {
                reason: AbuseReason::Velocity
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProtectError::RateLimited { retry_after: 10 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ProtectError::DecryptionFailure.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ProtectError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_retry_after_header_set() {
        let response = ProtectError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("42")
        );
    }

    #[test]
    fn test_cipher_failure_carries_no_detail() {
        let response = ProtectError::DecryptionFailure.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
