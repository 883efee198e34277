use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use musicbox::{
    config::SpotifyConfig,
    management::{IdentityStore, MemoryIdentityStore},
    spotify::{ApiClientError, SpotifyClient, SpotifyOAuth},
    types::{LinkedIdentity, SpotifyCredentials},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string_contains, header, method, path, query_param},
};

const CLIENT_ID: &str = "client-id";
const CLIENT_SECRET: &str = "client-secret";

struct Harness {
    server: MockServer,
    store: Arc<dyn IdentityStore>,
    client: SpotifyClient,
    identity: LinkedIdentity,
}

fn spotify_config(server: &MockServer) -> SpotifyConfig {
    SpotifyConfig {
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        redirect_uri: "http://localhost/link/callback".to_string(),
        auth_url: reqwest::Url::parse(&format!("{}/authorize", server.uri())).expect("url"),
        token_url: format!("{}/api/token", server.uri()),
        api_url: format!("{}/v1", server.uri()),
        market: "DE".to_string(),
    }
}

/// Sets up a linked identity holding `stale`/`refresh` credentials.
async fn harness() -> Harness {
    let server = MockServer::start().await;
    let config = spotify_config(&server);
    let http = reqwest::Client::new();

    let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
    let identity = store.create("api-token".to_string()).await.expect("create");
    let credentials = SpotifyCredentials {
        access_token: "stale".to_string(),
        refresh_token: "refresh".to_string(),
    };
    store
        .update_credentials(identity.id, &credentials)
        .await
        .expect("link");

    let oauth = SpotifyOAuth::new(http.clone(), config.clone());
    let client = SpotifyClient::new(http, config.api_url, oauth, Arc::clone(&store));

    Harness {
        server,
        store,
        client,
        identity: LinkedIdentity {
            id: identity.id,
            credentials,
        },
    }
}

fn devices_body() -> serde_json::Value {
    json!({
        "devices": [{
            "id": "device-1",
            "is_active": true,
            "name": "Kitchen",
            "type": "Speaker",
            "volume_percent": 40,
            "supports_volume": true
        }]
    })
}

async fn stored_credentials(h: &Harness) -> SpotifyCredentials {
    h.store
        .load(h.identity.id)
        .await
        .expect("load")
        .and_then(|i| i.spotify)
        .expect("credentials")
}

#[tokio::test]
async fn test_request_succeeds_without_refresh() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    let devices = h.client.get_devices(&mut h.identity).await.expect("devices");

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Kitchen");
    assert_eq!(devices[0].kind, "Speaker");
    assert_eq!(h.identity.credentials.access_token, "stale");
}

#[tokio::test]
async fn test_unauthorized_triggers_refresh_and_retry() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(1)
        .mount(&h.server)
        .await;

    let basic = format!(
        "Basic {}",
        STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}"))
    );
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("authorization", basic.as_str()))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let devices = h.client.get_devices(&mut h.identity).await.expect("devices");
    assert_eq!(devices.len(), 1);

    // No rotation: the old refresh token is kept
    let expected = SpotifyCredentials {
        access_token: "fresh".to_string(),
        refresh_token: "refresh".to_string(),
    };
    assert_eq!(h.identity.credentials, expected);
    assert_eq!(stored_credentials(&h).await, expected);

    // The bearer token is never touched by a refresh
    let identity = h.store.load(h.identity.id).await.expect("load").expect("identity");
    assert_eq!(identity.api_token, "api-token");
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "rotated",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.get_devices(&mut h.identity).await.expect("devices");

    assert_eq!(
        stored_credentials(&h).await,
        SpotifyCredentials {
            access_token: "fresh".to_string(),
            refresh_token: "rotated".to_string(),
        }
    );
}

#[tokio::test]
async fn test_second_unauthorized_gives_up_after_one_refresh() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.client.get_devices(&mut h.identity).await;
    assert!(matches!(result, Err(ApiClientError::Unauthorized)));

    // The refreshed credentials are kept even though the retry failed
    assert_eq!(stored_credentials(&h).await.access_token, "fresh");
}

#[tokio::test]
async fn test_failed_refresh_keeps_credentials() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.client.get_devices(&mut h.identity).await;
    assert!(matches!(result, Err(ApiClientError::RefreshFailed(_))));

    let unchanged = SpotifyCredentials {
        access_token: "stale".to_string(),
        refresh_token: "refresh".to_string(),
    };
    assert_eq!(h.identity.credentials, unchanged);
    assert_eq!(stored_credentials(&h).await, unchanged);
}

#[tokio::test]
async fn test_refresh_without_access_token_fails() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "" })))
        .mount(&h.server)
        .await;

    let result = h.client.get_devices(&mut h.identity).await;
    assert!(matches!(result, Err(ApiClientError::RefreshFailed(_))));
    assert_eq!(stored_credentials(&h).await.access_token, "stale");
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    match h.client.get_devices(&mut h.identity).await {
        Err(ApiClientError::UnexpectedStatus { status, body }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "try later");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_read_endpoint_requires_ok() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .and(query_param("market", "DE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;

    let result = h.client.get_currently_playing(&mut h.identity, "DE").await;
    assert!(matches!(
        result,
        Err(ApiClientError::UnexpectedStatus { .. })
    ));
}

#[tokio::test]
async fn test_playlists_are_paged() {
    let mut h = harness().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "total": 41
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .get_playlists(&mut h.identity, 20, 40)
        .await
        .expect("playlists");
}

#[tokio::test]
async fn test_play_sends_context_and_device() {
    let mut h = harness().await;

    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(query_param("device_id", "device-1"))
        .and(body_json(json!({ "context_uri": "spotify:playlist:abc123" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .play(&mut h.identity, Some("device-1"), Some("abc123"))
        .await
        .expect("play");
}

#[tokio::test]
async fn test_playback_control_accepts_no_content() {
    let mut h = harness().await;

    Mock::given(method("POST"))
        .and(path("/v1/me/player/next"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/pause"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.next(&mut h.identity).await.expect("next");
    h.client.pause(&mut h.identity).await.expect("pause");
}

#[tokio::test]
async fn test_playback_control_rejects_not_found() {
    let mut h = harness().await;

    Mock::given(method("PUT"))
        .and(path("/v1/me/player/pause"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no active device"))
        .mount(&h.server)
        .await;

    let result = h.client.pause(&mut h.identity).await;
    assert!(matches!(
        result,
        Err(ApiClientError::UnexpectedStatus { .. })
    ));
}
