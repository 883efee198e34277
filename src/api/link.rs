//! Spotify account linking.
//!
//! `GET /link/begin` stores `<nonce>:<bearer token>` in the caller's session
//! and redirects to Spotify with that value as OAuth `state`. Spotify sends
//! the browser back to `GET /link/callback`, where the state is checked
//! against the session, consumed, and the authorization code exchanged.
//!
//! The callback carries no `Authorization` header; the bearer guard picks
//! the token out of `state` instead. Whatever token the guard resolved, the
//! callback only proceeds for the identity named in `state`.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{
    error::ApiError,
    guard::{Authenticated, token_from_state},
};
use crate::{management::STATE_KEY, server::AppState, utils::constant_time_eq};

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /link/begin` - redirects to Spotify's authorization page.
pub async fn begin_link(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let oauth_state = format!("{}:{}", state.tokens.csrf_nonce(), identity.api_token);

    let mut session = state.sessions.load(&headers).await;
    session.insert(STATE_KEY, oauth_state.as_str());
    let cookie = state.sessions.save(&mut session).await.map_err(|e| {
        tracing::error!(identity = identity.id, err = %e, "failed to save session");
        ApiError::Internal
    })?;

    let url = state.oauth.authorize_url(&oauth_state);
    let location = HeaderValue::from_str(url.as_str()).map_err(|e| {
        tracing::error!(err = %e, "authorization url is not a valid header");
        ApiError::Internal
    })?;

    tracing::info!(identity = identity.id, "starting spotify link");
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}

/// `GET /link/callback` - completes linking after Spotify's redirect.
pub async fn link_callback(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let mut session = state.sessions.load(&headers).await;

    let callback_state = params.state.as_deref().unwrap_or_default();
    let matches = session
        .get(STATE_KEY)
        .is_some_and(|expected| constant_time_eq(expected, callback_state));
    if !matches {
        tracing::warn!(identity = identity.id, "oauth state mismatch");
        return Err(ApiError::StateMismatch);
    }

    // Credentials go to the identity named in the state, never to one picked
    // up from another token source on the same request.
    let bound = token_from_state(callback_state)
        .is_some_and(|token| constant_time_eq(token, &identity.api_token));
    if !bound {
        tracing::warn!(identity = identity.id, "oauth state belongs to another identity");
        return Err(ApiError::StateMismatch);
    }

    // Consume the state before talking to Spotify so it cannot be replayed.
    session.remove(STATE_KEY);
    let cookie = state.sessions.save(&mut session).await.map_err(|e| {
        tracing::error!(identity = identity.id, err = %e, "failed to save session");
        ApiError::Internal
    })?;

    let outcome = complete_link(&state, identity.id, &params).await;
    let mut response = match outcome {
        Ok(()) => (StatusCode::OK, "You can now close this window").into_response(),
        Err(e) => e.into_response(),
    };
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn complete_link(
    state: &AppState,
    identity_id: u64,
    params: &CallbackParams,
) -> Result<(), ApiError> {
    if let Some(error) = &params.error {
        tracing::warn!(identity = identity_id, error = %error, "spotify authorization denied");
        return Err(ApiError::BadRequest("Authorization denied"));
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::warn!(identity = identity_id, "callback without authorization code");
        return Err(ApiError::BadRequest("Missing code"));
    };

    let credentials = state.oauth.exchange_code(code).await.map_err(|e| {
        tracing::error!(identity = identity_id, err = %e, "failed to exchange code for token");
        ApiError::Internal
    })?;

    state
        .store
        .update_credentials(identity_id, &credentials)
        .await
        .map_err(|e| {
            tracing::error!(identity = identity_id, err = %e, "failed to store credentials");
            ApiError::Internal
        })?;

    tracing::info!(identity = identity_id, "linked spotify account");
    Ok(())
}
