//! Playback and library endpoints used by music boxes.
//!
//! Read endpoints accept exactly `200 OK`; playback control accepts `200` or
//! `204`. Any other status becomes [`ApiClientError::UnexpectedStatus`] with
//! the upstream body attached for the logs.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::client::{ApiClientError, ApiRequest, SpotifyClient};
use crate::types::{
    CurrentlyPlayingResponse, Device, DevicesResponse, LinkedIdentity, PlaylistResponse,
    PlaylistsResponse, StartPlaybackRequest,
};

const READ_OK: &[StatusCode] = &[StatusCode::OK];
const CONTROL_OK: &[StatusCode] = &[StatusCode::OK, StatusCode::NO_CONTENT];

/// Turns a playlist id into the context URI Spotify expects.
pub fn playlist_uri(playlist_id: &str) -> String {
    format!("spotify:playlist:{playlist_id}")
}

impl SpotifyClient {
    /// Lists the current user's playlists.
    pub async fn get_playlists(
        &self,
        identity: &mut LinkedIdentity,
        limit: i64,
        offset: i64,
    ) -> Result<PlaylistsResponse, ApiClientError> {
        let request = ApiRequest::get("/me/playlists")
            .query("limit", limit)
            .query("offset", offset);
        let res = self.request(&request, identity).await?;
        read_json(expect_status(res, READ_OK).await?).await
    }

    pub async fn get_playlist(
        &self,
        identity: &mut LinkedIdentity,
        playlist_id: &str,
    ) -> Result<PlaylistResponse, ApiClientError> {
        let request = ApiRequest::get(format!("/playlists/{playlist_id}"));
        let res = self.request(&request, identity).await?;
        read_json(expect_status(res, READ_OK).await?).await
    }

    pub async fn get_devices(
        &self,
        identity: &mut LinkedIdentity,
    ) -> Result<Vec<Device>, ApiClientError> {
        let request = ApiRequest::get("/me/player/devices");
        let res = self.request(&request, identity).await?;
        let devices: DevicesResponse = read_json(expect_status(res, READ_OK).await?).await?;
        Ok(devices.devices)
    }

    pub async fn get_currently_playing(
        &self,
        identity: &mut LinkedIdentity,
        market: &str,
    ) -> Result<CurrentlyPlayingResponse, ApiClientError> {
        let request = ApiRequest::get("/me/player/currently-playing").query("market", market);
        let res = self.request(&request, identity).await?;
        read_json(expect_status(res, READ_OK).await?).await
    }

    pub async fn next(&self, identity: &mut LinkedIdentity) -> Result<(), ApiClientError> {
        let res = self
            .request(&ApiRequest::post("/me/player/next"), identity)
            .await?;
        expect_status(res, CONTROL_OK).await?;
        Ok(())
    }

    pub async fn pause(&self, identity: &mut LinkedIdentity) -> Result<(), ApiClientError> {
        let res = self
            .request(&ApiRequest::put("/me/player/pause"), identity)
            .await?;
        expect_status(res, CONTROL_OK).await?;
        Ok(())
    }

    /// Starts or resumes playback.
    ///
    /// Without a device id Spotify picks the active device; without a
    /// playlist id the current context is resumed.
    pub async fn play(
        &self,
        identity: &mut LinkedIdentity,
        device_id: Option<&str>,
        playlist_id: Option<&str>,
    ) -> Result<(), ApiClientError> {
        let body = StartPlaybackRequest {
            context_uri: playlist_id.map(playlist_uri),
        };

        let mut request = ApiRequest::put("/me/player/play").json(serde_json::to_value(&body)?);
        if let Some(device_id) = device_id {
            request = request.query("device_id", device_id);
        }

        let res = self.request(&request, identity).await?;
        expect_status(res, CONTROL_OK).await?;
        Ok(())
    }
}

async fn expect_status(
    res: Response,
    accepted: &[StatusCode],
) -> Result<Response, ApiClientError> {
    let status = res.status();
    if accepted.contains(&status) {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    Err(ApiClientError::UnexpectedStatus { status, body })
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ApiClientError> {
    let bytes = res.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
