use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    Res, api,
    config::Config,
    management::{IdentityStore, JsonFileIdentityStore, SessionManager},
    spotify::{SpotifyClient, SpotifyOAuth},
    success,
    utils::TokenGenerator,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IdentityStore>,
    pub tokens: Arc<TokenGenerator>,
    pub sessions: Arc<SessionManager>,
    pub oauth: SpotifyOAuth,
    pub spotify: SpotifyClient,
    pub provisioning_secret: Arc<str>,
    pub market: String,
}

impl AppState {
    /// Wires the Spotify clients and session manager around `store`.
    ///
    /// `tokens` supplies bearer tokens, CSRF nonces and session ids; tests
    /// pass a seeded generator to get reproducible values.
    pub fn new(
        config: &Config,
        store: Arc<dyn IdentityStore>,
        tokens: TokenGenerator,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let tokens = Arc::new(tokens);
        let oauth = SpotifyOAuth::new(http.clone(), config.spotify.clone());
        let spotify = SpotifyClient::new(
            http,
            config.spotify.api_url.clone(),
            oauth.clone(),
            Arc::clone(&store),
        );
        let sessions = Arc::new(SessionManager::new(
            &config.session_secret,
            Arc::clone(&tokens),
        ));

        Ok(Self {
            store,
            tokens,
            sessions,
            oauth,
            spotify,
            provisioning_secret: Arc::from(config.provisioning_secret.as_str()),
            market: config.spotify.market.clone(),
        })
    }
}

/// Assembles the router.
///
/// Linking routes need a valid bearer token; playback routes additionally
/// need linked Spotify credentials.
pub fn build_router(state: AppState) -> Router {
    let linking = Router::new()
        .route("/link/begin", get(api::begin_link))
        .route("/link/callback", get(api::link_callback));

    let playback = Router::new()
        .route("/playlists", get(api::get_playlists))
        .route("/playlists/{id}", get(api::get_playlist))
        .route("/devices", get(api::get_devices))
        .route("/now-playing", get(api::get_now_playing))
        .route("/player/next", post(api::next))
        .route("/player/pause", post(api::pause))
        .route("/player/play", post(api::play))
        .route_layer(middleware::from_fn(api::require_link));

    let authenticated = linking.merge(playback).route_layer(middleware::from_fn_with_state(
        state.clone(),
        api::require_identity,
    ));

    Router::new()
        .route("/health", get(api::health))
        .route("/identity", post(api::create_identity))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Opens the identity store and serves the API until the process exits.
pub async fn start_api_server(config: Config) -> Res<()> {
    let store = JsonFileIdentityStore::open(&config.identity_store_path).await?;
    tracing::info!(path = %store.path().display(), "opened identity store");

    let state = AppState::new(&config, Arc::new(store), TokenGenerator::from_entropy())?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    success!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
