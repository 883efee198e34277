use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Failures the HTTP layer reports to clients.
///
/// Messages are fixed per variant: causes are logged where they are
/// detected, never echoed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// No usable bearer token, whatever the reason.
    Unauthorized,
    /// Authenticated, but no Spotify account is linked.
    Unlinked,
    /// OAuth callback state did not match the session.
    StateMismatch,
    BadRequest(&'static str),
    Internal,
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::Unlinked => StatusCode::UNAUTHORIZED,
            Self::StateMismatch | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Unlinked => "Missing Spotify token",
            Self::StateMismatch => "State mismatch",
            Self::BadRequest(message) => message,
            Self::Internal => "Internal server error",
        }
    }
}

/// Error body returned for every [`ApiError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message().to_owned(),
        };
        (self.http_status(), Json(body)).into_response()
    }
}
