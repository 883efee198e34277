use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use crate::{
    config::SpotifyConfig,
    types::{SpotifyCredentials, TokenResponse},
};

/// Permissions requested when linking a Spotify account.
pub const SCOPES: &[&str] = &[
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-modify-playback-state",
    "user-read-playback-state",
];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("token response is malformed: {0}")]
    Malformed(String),
}

/// Spotify's OAuth 2.0 authorization-code flow for confidential clients.
///
/// Covers the three token endpoint interactions the service needs: the
/// authorization redirect, code exchange on callback, and refresh of an
/// expired access token.
#[derive(Clone)]
pub struct SpotifyOAuth {
    http: Client,
    config: SpotifyConfig,
}

impl SpotifyOAuth {
    pub fn new(http: Client, config: SpotifyConfig) -> Self {
        Self { http, config }
    }

    /// Builds the URL the user's browser is redirected to.
    ///
    /// `state` is passed through untouched and comes back on the callback.
    /// Offline access is requested so that Spotify issues a refresh token.
    ///
    /// # Example
    ///
    /// ```
    /// let url = oauth.authorize_url("nonce:token");
    /// // https://accounts.spotify.com/authorize?client_id=...&state=nonce%3Atoken
    /// ```
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("state", state);
        url
    }

    /// Exchanges an authorization code for an access/refresh token pair.
    ///
    /// # Errors
    ///
    /// Fails with [`TokenError::Malformed`] when Spotify does not return a
    /// refresh token, since a link without one cannot survive token expiry.
    pub async fn exchange_code(&self, code: &str) -> Result<SpotifyCredentials, TokenError> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;

        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TokenError::Malformed("missing refresh_token".to_string()))?;

        Ok(SpotifyCredentials {
            access_token: token.access_token,
            refresh_token,
        })
    }

    /// Obtains a fresh access token using the stored refresh token.
    ///
    /// Spotify may or may not rotate the refresh token. When the response
    /// carries none, the current refresh token is kept.
    pub async fn refresh(
        &self,
        current: &SpotifyCredentials,
    ) -> Result<SpotifyCredentials, TokenError> {
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &current.refresh_token),
            ])
            .await?;

        Ok(SpotifyCredentials {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, TokenError> {
        let res = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TokenError::Rejected { status, body });
        }

        let bytes = res.bytes().await?;
        let token: TokenResponse =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(TokenError::Malformed("empty access_token".to_string()));
        }

        Ok(token)
    }
}
