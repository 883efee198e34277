use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::{Identity, SpotifyCredentials};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bearer token is already in use")]
    DuplicateToken,
    #[error("identity {0} not found")]
    NotFound(u64),
    #[error("identity store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence for [`Identity`] records.
///
/// Implementations must make concurrent `update_credentials` calls for the
/// same identity safe; callers add no locking of their own.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Creates an unlinked identity owning `api_token`.
    ///
    /// Fails with [`StoreError::DuplicateToken`] if any identity, deleted or
    /// not, already holds the token.
    async fn create(&self, api_token: String) -> Result<Identity, StoreError>;

    async fn load(&self, id: u64) -> Result<Option<Identity>, StoreError>;

    /// Resolves a bearer token. Soft-deleted identities never match.
    async fn find_by_api_token(&self, api_token: &str) -> Result<Option<Identity>, StoreError>;

    /// Overwrites the Spotify credential pair and nothing else.
    async fn update_credentials(
        &self,
        id: u64,
        credentials: &SpotifyCredentials,
    ) -> Result<(), StoreError>;

    async fn soft_delete(&self, id: u64) -> Result<(), StoreError>;
}

/// Identity records plus the id sequence, shared by the store implementations.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct IdentityTable {
    next_id: u64,
    identities: BTreeMap<u64, Identity>,
}

impl IdentityTable {
    pub(crate) fn create(&mut self, api_token: String) -> Result<Identity, StoreError> {
        if self.identities.values().any(|i| i.api_token == api_token) {
            return Err(StoreError::DuplicateToken);
        }

        self.next_id += 1;
        let now = Utc::now();
        let identity = Identity {
            id: self.next_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            api_token,
            spotify: None,
        };
        self.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    pub(crate) fn load(&self, id: u64) -> Option<Identity> {
        self.identities.get(&id).cloned()
    }

    pub(crate) fn find_by_api_token(&self, api_token: &str) -> Option<Identity> {
        self.identities
            .values()
            .find(|i| !i.is_deleted() && i.api_token == api_token)
            .cloned()
    }

    pub(crate) fn update_credentials(
        &mut self,
        id: u64,
        credentials: &SpotifyCredentials,
    ) -> Result<(), StoreError> {
        let identity = self
            .identities
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        identity.spotify = Some(credentials.clone());
        identity.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn soft_delete(&mut self, id: u64) -> Result<(), StoreError> {
        let identity = self
            .identities
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        let now = Utc::now();
        identity.deleted_at.get_or_insert(now);
        identity.updated_at = now;
        Ok(())
    }
}

/// In-process identity store without persistence.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    table: RwLock<IdentityTable>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create(&self, api_token: String) -> Result<Identity, StoreError> {
        self.table.write().await.create(api_token)
    }

    async fn load(&self, id: u64) -> Result<Option<Identity>, StoreError> {
        Ok(self.table.read().await.load(id))
    }

    async fn find_by_api_token(&self, api_token: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.table.read().await.find_by_api_token(api_token))
    }

    async fn update_credentials(
        &self,
        id: u64,
        credentials: &SpotifyCredentials,
    ) -> Result<(), StoreError> {
        self.table.write().await.update_credentials(id, credentials)
    }

    async fn soft_delete(&self, id: u64) -> Result<(), StoreError> {
        self.table.write().await.soft_delete(id)
    }
}
