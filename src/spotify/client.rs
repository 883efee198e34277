use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode, header};
use serde_json::Value;
use thiserror::Error;

use super::auth::{SpotifyOAuth, TokenError};
use crate::{
    management::{IdentityStore, StoreError},
    types::LinkedIdentity,
};

/// The first attempt plus one retry after a credential refresh.
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("spotify request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spotify rejected the refreshed access token")]
    Unauthorized,
    #[error("refreshing spotify credentials failed: {0}")]
    RefreshFailed(#[source] TokenError),
    #[error("persisting refreshed credentials failed: {0}")]
    Store(#[from] StoreError),
    #[error("spotify answered {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("spotify response is malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A Spotify Web API call, described independently of the credentials used.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Spotify Web API client acting on behalf of a linked identity.
///
/// Every call carries the identity's access token. A 401 answer triggers a
/// single refresh of the credentials, which are persisted before the call is
/// repeated once with the new token.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    api_url: String,
    oauth: SpotifyOAuth,
    store: Arc<dyn IdentityStore>,
}

impl SpotifyClient {
    pub fn new(
        http: Client,
        api_url: impl Into<String>,
        oauth: SpotifyOAuth,
        store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            oauth,
            store,
        }
    }

    /// Sends `request`, refreshing the credentials at most once.
    ///
    /// Transport failures are returned immediately. Any status other than
    /// 401 is handed back untouched; judging it is up to the caller. A 401
    /// on the retry ends in [`ApiClientError::Unauthorized`].
    ///
    /// On a successful refresh `identity` holds the new credentials when this
    /// returns, whatever the outcome of the retry.
    pub async fn request(
        &self,
        request: &ApiRequest,
        identity: &mut LinkedIdentity,
    ) -> Result<Response, ApiClientError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let res = self.send(request, identity).await?;
            if res.status() != StatusCode::UNAUTHORIZED {
                return Ok(res);
            }

            if attempt < MAX_ATTEMPTS {
                tracing::debug!(
                    identity = identity.id,
                    path = %request.path,
                    "access token rejected, refreshing"
                );
                self.refresh(identity).await?;
            }
        }

        tracing::warn!(
            identity = identity.id,
            path = %request.path,
            "access token rejected after refresh"
        );
        Err(ApiClientError::Unauthorized)
    }

    async fn send(
        &self,
        request: &ApiRequest,
        identity: &LinkedIdentity,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.api_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .bearer_auth(&identity.credentials.access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            Some(body) => builder.json(body),
            // Spotify answers 411 to bodiless PUT/POST without a length.
            None if request.method != Method::GET => builder.header(header::CONTENT_LENGTH, 0),
            None => builder,
        };

        builder.send().await
    }

    /// Swaps the identity's credentials for freshly refreshed ones.
    ///
    /// Only the credential pair is written back. If either the refresh or the
    /// write fails, the stored and in-memory credentials stay as they were.
    async fn refresh(&self, identity: &mut LinkedIdentity) -> Result<(), ApiClientError> {
        let credentials = match self.oauth.refresh(&identity.credentials).await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!(identity = identity.id, err = %e, "credential refresh failed");
                return Err(ApiClientError::RefreshFailed(e));
            }
        };

        self.store
            .update_credentials(identity.id, &credentials)
            .await?;
        identity.credentials = credentials;

        tracing::info!(identity = identity.id, "refreshed spotify credentials");
        Ok(())
    }
}
