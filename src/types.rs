use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Spotify credential pair stored on a linked identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Anonymous identity of a music box.
///
/// `api_token` is the bearer token issued at creation; it never changes.
/// `spotify` stays `None` until the OAuth callback completes.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<SpotifyCredentials>,
}

impl Identity {
    pub fn is_linked(&self) -> bool {
        self.spotify.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .field("api_token", &"<redacted>")
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// Identity that has completed Spotify linking.
///
/// Handlers that talk to Spotify take this type, so an unlinked identity can
/// never reach the API client.
#[derive(Debug, Clone)]
pub struct LinkedIdentity {
    pub id: u64,
    pub credentials: SpotifyCredentials,
}

impl LinkedIdentity {
    pub fn from_identity(identity: &Identity) -> Option<Self> {
        identity.spotify.as_ref().map(|credentials| Self {
            id: identity.id,
            credentials: credentials.clone(),
        })
    }
}

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Treats an explicit JSON `null` like an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub height: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub width: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Album {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub release_date: String,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackTotal {
    #[serde(default, deserialize_with = "nullable")]
    pub total: u32,
}

/// Playlist summary or track, depending on where Spotify returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub public: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<Image>,
    #[serde(default, deserialize_with = "nullable")]
    pub tracks: TrackTotal,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub album: Album,
    #[serde(default, deserialize_with = "nullable")]
    pub artists: Vec<Artist>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistsResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistTrackAlbum {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub release_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistTrack {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub album: PlaylistTrackAlbum,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistTrackItem {
    #[serde(default)]
    pub track: Option<PlaylistTrack>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistTracks {
    #[serde(default, deserialize_with = "nullable")]
    pub total: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<PlaylistTrackItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub public: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub collaborative: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<Image>,
    #[serde(default, deserialize_with = "nullable")]
    pub tracks: PlaylistTracks,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default)]
    pub volume_percent: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub supports_volume: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentlyPlayingResponse {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default, deserialize_with = "nullable")]
    pub repeat_state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub shuffle_state: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_playing: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub currently_playing_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub progress_ms: i64,
    #[serde(default)]
    pub item: Option<Item>,
}

/// Body accepted by `POST /player/play`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
}

/// Body sent to Spotify's start/resume playback endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartPlaybackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
}
