//! # Spotify Integration Module
//!
//! This module is the integration layer between the music box backend and
//! Spotify. It implements the OAuth 2.0 authorization-code flow used to link
//! an identity, and a Web API client that keeps calls authorized by renewing
//! expired access tokens on its own.
//!
//! ## Architecture
//!
//! ```text
//! HTTP handlers (api)
//!          ↓
//! Spotify Integration Layer
//!     ├── auth    (authorize URL, code exchange, refresh grant)
//!     ├── client  (authorized requests, refresh-and-retry)
//!     └── player  (playlists, devices, playback control)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//!          ↓
//! Spotify Accounts service / Web API
//! ```
//!
//! ## Token Lifecycle
//!
//! 1. **Linking**: [`auth::SpotifyOAuth::exchange_code`] turns the callback's
//!    authorization code into an access/refresh token pair.
//! 2. **Use**: [`client::SpotifyClient::request`] attaches the access token.
//! 3. **Renewal**: on a `401 Unauthorized`, the client refreshes the pair
//!    once, persists it through the identity store (credential fields only)
//!    and retries the call once. A second `401` is final.
//!
//! There is no per-identity lock around renewal. Two concurrent calls that
//! both see an expired token may both refresh; each ends with a valid pair.
//!
//! ## Error Types
//!
//! - [`auth::TokenError`] - token endpoint failures (transport, rejection, bad payload)
//! - [`client::ApiClientError`] - Web API failures, including a failed refresh
//!
//! ## Dependencies
//!
//! - **reqwest** - HTTP client with JSON and form support
//! - **serde_json** - JSON serialization and deserialization

pub mod auth;
pub mod client;
pub mod player;

pub use auth::{SpotifyOAuth, TokenError};
pub use client::{ApiClientError, ApiRequest, SpotifyClient};
