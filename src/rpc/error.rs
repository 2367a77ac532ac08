//! Transport-level dispatch errors.
//!
//! Each variant maps to one HTTP status and one stable snake_case `kind`
//! that appears in the error envelope. Domain failures reported by handlers
//! are not transport errors; see [`crate::handlers::DomainError`].

use axum::http::StatusCode;

use crate::auth::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Authorization header missing")]
    NoCredentials,

    #[error("Invalid credentials")]
    MalformedCredentials,

    #[error("Unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("Application passwords not available")]
    BackendUnavailable,

    #[error("Authentication failed")]
    Rejected,

    #[error("Insufficient permissions")]
    InsufficientPermission,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Method not found: {0}")]
    UnknownOperation(String),

    #[error("Unknown tool: {0}")]
    UnknownCapability(String),

    #[error("No handler bound for tool: {0}")]
    HandlerMissing(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoCredentials
            | DispatchError::MalformedCredentials
            | DispatchError::UnsupportedScheme
            | DispatchError::Rejected => StatusCode::UNAUTHORIZED,
            DispatchError::InsufficientPermission => StatusCode::FORBIDDEN,
            DispatchError::BackendUnavailable | DispatchError::HandlerMissing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DispatchError::MalformedPayload(_)
            | DispatchError::UnknownOperation(_)
            | DispatchError::UnknownCapability(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoCredentials => "no_auth",
            DispatchError::MalformedCredentials => "invalid_auth",
            DispatchError::UnsupportedScheme => "invalid_auth_scheme",
            DispatchError::BackendUnavailable => "backend_unavailable",
            DispatchError::Rejected => "auth_rejected",
            DispatchError::InsufficientPermission => "insufficient_permission",
            DispatchError::MalformedPayload(_) => "malformed_payload",
            DispatchError::UnknownOperation(_) => "unknown_operation",
            DispatchError::UnknownCapability(_) => "unknown_capability",
            DispatchError::HandlerMissing(_) => "handler_missing",
        }
    }
}

impl From<AuthError> for DispatchError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoCredentials => DispatchError::NoCredentials,
            AuthError::MalformedCredentials => DispatchError::MalformedCredentials,
            AuthError::UnsupportedScheme => DispatchError::UnsupportedScheme,
            AuthError::BackendUnavailable => DispatchError::BackendUnavailable,
            AuthError::Rejected => DispatchError::Rejected,
            AuthError::InsufficientPermission => DispatchError::InsufficientPermission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses() {
        let cases = [
            (AuthError::NoCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::MalformedCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::UnsupportedScheme, StatusCode::UNAUTHORIZED),
            (AuthError::Rejected, StatusCode::UNAUTHORIZED),
            (AuthError::BackendUnavailable, StatusCode::INTERNAL_SERVER_ERROR),
            (AuthError::InsufficientPermission, StatusCode::FORBIDDEN),
        ];
        for (auth, status) in cases {
            assert_eq!(DispatchError::from(auth).status(), status);
        }
    }

    #[test]
    fn test_routing_statuses() {
        assert_eq!(
            DispatchError::MalformedPayload("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::UnknownOperation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::UnknownCapability("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::HandlerMissing("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_kinds_are_snake_case() {
        assert_eq!(DispatchError::NoCredentials.kind(), "no_auth");
        assert_eq!(
            DispatchError::UnknownCapability("x".into()).kind(),
            "unknown_capability"
        );
        assert_eq!(
            DispatchError::UnknownCapability("x".into()).to_string(),
            "Unknown tool: x"
        );
    }
}
