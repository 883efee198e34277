//! Configuration management for the music box backend.
//!
//! This module handles loading configuration values from environment
//! variables and `.env` files. All values are read exactly once at process
//! start into a [`Config`]; a missing or invalid required value is a fatal
//! startup condition and never surfaces as a runtime error.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_MARKET: &str = "DE";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Spotify application and endpoint settings.
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: reqwest::Url,
    pub token_url: String,
    pub api_url: String,
    pub market: String,
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("market", &self.market)
            .finish()
    }
}

/// Process-wide configuration, built once by [`Config::from_env`].
#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub identity_store_path: PathBuf,
    pub session_secret: String,
    pub provisioning_secret: String,
    pub http_timeout: Duration,
    pub spotify: SpotifyConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("identity_store_path", &self.identity_store_path)
            .field("http_timeout", &self.http_timeout)
            .field("spotify", &self.spotify)
            .finish_non_exhaustive()
    }
}

/// Loads environment variables from `.env` files.
///
/// Looks for a `.env` file in the current working directory first and then in
/// the platform-specific local data directory under `musicbox/.env`. Variables
/// already present in the process environment are never overwritten, so a
/// container deployment can skip the files entirely.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/musicbox/.env`
/// - macOS: `~/Library/Application Support/musicbox/.env`
/// - Windows: `%LOCALAPPDATA%/musicbox/.env`
///
/// # Returns
///
/// Returns the paths of the files that were loaded, so the caller can report
/// them.
pub fn load_env() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    if let Ok(path) = dotenv::dotenv() {
        loaded.push(path);
    }

    let path = data_dir().join(".env");
    if path.is_file() && dotenv::from_path(&path).is_ok() {
        loaded.push(path);
    }

    loaded
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for the first absent required
    /// variable and [`ConfigError::Invalid`] for values that cannot be
    /// parsed.
    ///
    /// # Example
    ///
    /// ```
    /// let config = Config::from_env()?;
    /// println!("binding to {}", config.server_addr);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let spotify = SpotifyConfig {
            client_id: required("SPOTIFY_API_AUTH_CLIENT_ID")?,
            client_secret: required("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
            redirect_uri: required("SPOTIFY_API_REDIRECT_URI")?,
            auth_url: reqwest::Url::parse(&optional("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL))
                .map_err(|e| ConfigError::Invalid {
                    name: "SPOTIFY_API_AUTH_URL",
                    reason: e.to_string(),
                })?,
            token_url: optional("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: optional("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            market: optional("SPOTIFY_MARKET", DEFAULT_MARKET),
        };

        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }

        let provisioning_secret = required("PROVISIONING_SECRET")?;

        let server_addr = SocketAddr::from_str(&optional("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS))
            .map_err(|e| ConfigError::Invalid {
                name: "SERVER_ADDRESS",
                reason: e.to_string(),
            })?;

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(value) if !value.is_empty() => {
                let secs = value.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            _ => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let identity_store_path = match env::var("IDENTITY_STORE_PATH") {
            Ok(value) if !value.is_empty() => PathBuf::from(value),
            _ => data_dir().join("identities.json"),
        };

        Ok(Self {
            server_addr,
            identity_store_path,
            session_secret,
            provisioning_secret,
            http_timeout,
            spotify,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("musicbox");
    path
}
