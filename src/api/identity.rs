use axum::{Json, extract::State, http::HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::{management::StoreError, server::AppState, types::Identity, utils::constant_time_eq};

/// Header carrying the deployment's provisioning secret.
pub const PROVISIONING_HEADER: &str = "x-provisioning-secret";

/// Fresh tokens tried before giving up on a run of collisions.
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Identity as returned once, at creation. Spotify credentials are never exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub id: u64,
    pub api_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            api_token: identity.api_token,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

/// `POST /identity` - issues a new anonymous identity and its bearer token.
///
/// Admission requires the deployment's provisioning secret in the
/// `X-Provisioning-Secret` header.
pub async fn create_identity(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IdentityResponse>, ApiError> {
    let presented = headers
        .get(PROVISIONING_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(presented, &state.provisioning_secret) {
        tracing::warn!("identity issuance refused: bad provisioning secret");
        return Err(ApiError::Unauthorized);
    }

    for _ in 0..MAX_ISSUE_ATTEMPTS {
        match state.store.create(state.tokens.bearer_token()).await {
            Ok(identity) => {
                tracing::info!(identity = identity.id, "issued identity");
                return Ok(Json(identity.into()));
            }
            Err(StoreError::DuplicateToken) => {
                tracing::warn!("generated bearer token collided, retrying");
            }
            Err(e) => {
                tracing::error!(err = %e, "failed to create identity");
                return Err(ApiError::Internal);
            }
        }
    }

    tracing::error!("could not generate a unique bearer token");
    Err(ApiError::Internal)
}
