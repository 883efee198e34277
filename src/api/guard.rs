//! Request authentication.
//!
//! [`require_identity`] resolves the caller's bearer token to an
//! [`Identity`] and [`require_link`] additionally demands a linked Spotify
//! account. Handlers receive the result through the [`Authenticated`] and
//! [`Linked`] extractors instead of looking it up themselves.

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::{
    server::AppState,
    types::{Identity, LinkedIdentity},
};

/// Query parameter carrying a bearer token directly.
pub const TOKEN_QUERY_PARAM: &str = "api_token";

/// Query parameter carrying `<nonce>:<token>` on the OAuth callback.
pub const STATE_QUERY_PARAM: &str = "state";

/// Identity resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

/// Identity with linked Spotify credentials.
#[derive(Debug, Clone)]
pub struct Linked(pub LinkedIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for Linked
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Linked>()
            .cloned()
            .ok_or(ApiError::Unlinked)
    }
}

/// Finds the bearer token of a request.
///
/// Sources are tried in order and the first non-empty token wins:
/// 1. `Authorization: Bearer <token>`
/// 2. `?api_token=<token>`
/// 3. `?state=<nonce>:<token>`, which must split into exactly two parts
///
/// An `Authorization` header using any other scheme is rejected outright,
/// regardless of the query parameters.
pub fn extract_token(
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<Option<String>, ApiError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        if !token.is_empty() {
            return Ok(Some(token.to_string()));
        }
    }

    if let Some(token) = params.get(TOKEN_QUERY_PARAM).filter(|t| !t.is_empty()) {
        return Ok(Some(token.clone()));
    }

    Ok(params
        .get(STATE_QUERY_PARAM)
        .and_then(|state| token_from_state(state))
        .map(str::to_string))
}

/// Returns the token part of a `<nonce>:<token>` OAuth state.
pub fn token_from_state(state: &str) -> Option<&str> {
    let mut parts = state.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Middleware admitting only requests with a valid bearer token.
///
/// Every failure answers the same 401 so callers cannot tell a missing token
/// from an unknown one.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let params = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    let token = match extract_token(req.headers(), &params) {
        Ok(Some(token)) => token,
        Ok(None) => return ApiError::Unauthorized.into_response(),
        Err(e) => {
            tracing::debug!("rejecting authorization header with unsupported scheme");
            return e.into_response();
        }
    };

    match state.store.find_by_api_token(&token).await {
        Ok(Some(identity)) => {
            req.extensions_mut().insert(Authenticated(identity));
            next.run(req).await
        }
        Ok(None) => {
            tracing::debug!("bearer token does not match any identity");
            ApiError::Unauthorized.into_response()
        }
        Err(e) => {
            tracing::error!(err = %e, "failed to find identity by bearer token");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Middleware admitting only identities with linked Spotify credentials.
///
/// Must run after [`require_identity`].
pub async fn require_link(mut req: Request, next: Next) -> Response {
    let Some(Authenticated(identity)) = req.extensions().get::<Authenticated>() else {
        return ApiError::Unauthorized.into_response();
    };

    let Some(linked) = LinkedIdentity::from_identity(identity) else {
        return ApiError::Unlinked.into_response();
    };

    req.extensions_mut().insert(Linked(linked));
    next.run(req).await
}
