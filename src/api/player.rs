use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::{error::ApiError, guard::Linked};
use crate::{
    server::AppState,
    spotify::ApiClientError,
    types::{CurrentlyPlayingResponse, Device, PlayRequest, PlaylistResponse, PlaylistsResponse},
};

const DEFAULT_LIMIT: i64 = 50;
const DEFAULT_OFFSET: i64 = 0;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Logs an upstream failure and hides it behind a generic 500.
fn upstream(operation: &'static str, identity: u64) -> impl FnOnce(ApiClientError) -> ApiError {
    move |e| {
        tracing::error!(identity, operation, err = %e, "spotify call failed");
        ApiError::Internal
    }
}

fn parse_page_value(
    value: Option<&str>,
    default: i64,
    invalid: &'static str,
) -> Result<i64, ApiError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ApiError::BadRequest(invalid)),
    }
}

/// Spotify ids are base62.
fn is_spotify_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `GET /playlists?limit=&offset=`
pub async fn get_playlists(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
    Query(params): Query<PageParams>,
) -> Result<Json<PlaylistsResponse>, ApiError> {
    let limit = parse_page_value(params.limit.as_deref(), DEFAULT_LIMIT, "Invalid limit")?;
    let offset = parse_page_value(params.offset.as_deref(), DEFAULT_OFFSET, "Invalid offset")?;

    let id = identity.id;
    let playlists = state
        .spotify
        .get_playlists(&mut identity, limit, offset)
        .await
        .map_err(upstream("get playlists", id))?;
    Ok(Json(playlists))
}

/// `GET /playlists/{id}`
pub async fn get_playlist(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
    Path(playlist_id): Path<String>,
) -> Result<Json<PlaylistResponse>, ApiError> {
    if !is_spotify_id(&playlist_id) {
        return Err(ApiError::BadRequest("Invalid playlist id"));
    }

    let id = identity.id;
    let playlist = state
        .spotify
        .get_playlist(&mut identity, &playlist_id)
        .await
        .map_err(upstream("get playlist", id))?;
    Ok(Json(playlist))
}

/// `GET /devices`
pub async fn get_devices(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
) -> Result<Json<Vec<Device>>, ApiError> {
    let id = identity.id;
    let devices = state
        .spotify
        .get_devices(&mut identity)
        .await
        .map_err(upstream("get devices", id))?;
    Ok(Json(devices))
}

/// `GET /now-playing`
pub async fn get_now_playing(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
) -> Result<Json<CurrentlyPlayingResponse>, ApiError> {
    let id = identity.id;
    let playing = state
        .spotify
        .get_currently_playing(&mut identity, &state.market)
        .await
        .map_err(upstream("get currently playing", id))?;
    Ok(Json(playing))
}

/// `POST /player/next`
pub async fn next(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
) -> Result<StatusCode, ApiError> {
    let id = identity.id;
    state
        .spotify
        .next(&mut identity)
        .await
        .map_err(upstream("skip track", id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /player/pause`
pub async fn pause(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
) -> Result<StatusCode, ApiError> {
    let id = identity.id;
    state
        .spotify
        .pause(&mut identity)
        .await
        .map_err(upstream("pause playback", id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /player/play` with an optional `{"device_id", "playlist_id"}` body.
///
/// An empty body resumes playback on the active device.
pub async fn play(
    State(state): State<AppState>,
    Linked(mut identity): Linked,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: PlayRequest = if body.is_empty() {
        PlayRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(err = %e, "invalid play request body");
            ApiError::BadRequest("Invalid request")
        })?
    };

    let device_id = request.device_id.as_deref().filter(|d| !d.is_empty());
    let playlist_id = request.playlist_id.as_deref().filter(|p| !p.is_empty());
    if playlist_id.is_some_and(|p| !is_spotify_id(p)) {
        return Err(ApiError::BadRequest("Invalid playlist id"));
    }

    let id = identity.id;
    state
        .spotify
        .play(&mut identity, device_id, playlist_id)
        .await
        .map_err(upstream("start playback", id))?;
    Ok(StatusCode::NO_CONTENT)
}
