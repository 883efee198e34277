//! # API Module
//!
//! HTTP endpoints of the music box backend.
//!
//! ## Endpoints
//!
//! ### Identity
//!
//! - [`create_identity`] - `POST /identity`, issues an anonymous identity and
//!   its bearer token (guarded by the provisioning secret)
//!
//! ### Linking
//!
//! - [`begin_link`] - `GET /link/begin`, redirects to Spotify's consent page
//! - [`link_callback`] - `GET /link/callback`, validates the OAuth state and
//!   stores the Spotify credentials on the identity
//!
//! ### Playback
//!
//! - [`get_playlists`], [`get_playlist`], [`get_devices`], [`get_now_playing`]
//! - [`next`], [`pause`], [`play`]
//!
//! ### Monitoring
//!
//! - [`health`] - `GET /health`, application status and version
//!
//! ## Authentication
//!
//! Everything except `/health` and `/identity` sits behind
//! [`require_identity`]; playback endpoints additionally sit behind
//! [`require_link`]. Handlers receive the caller through the [`Authenticated`]
//! and [`Linked`] extractors.
//!
//! ## Errors
//!
//! Handlers return [`ApiError`], which renders a fixed status and
//! `{"message": ...}` body. Details of the underlying failure go to the log
//! only.

mod error;
mod guard;
mod health;
mod identity;
mod link;
mod player;

pub use error::{ApiError, ErrorBody};
pub use guard::{
    Authenticated, Linked, STATE_QUERY_PARAM, TOKEN_QUERY_PARAM, extract_token, require_identity,
    require_link, token_from_state,
};
pub use health::{Health, health};
pub use identity::{IdentityResponse, PROVISIONING_HEADER, create_identity};
pub use link::{CallbackParams, begin_link, link_callback};
pub use player::{get_devices, get_now_playing, get_playlist, get_playlists, next, pause, play};
