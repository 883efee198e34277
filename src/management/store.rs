use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::identity::{IdentityStore, IdentityTable, StoreError};
use crate::types::{Identity, SpotifyCredentials};

/// Identity store persisted as a single JSON document.
///
/// Every mutation is applied to a copy of the table, written to disk, and
/// only then committed in memory, so a failed write leaves both the file and
/// the in-memory state as they were. The mutex serializes all writers.
pub struct JsonFileIdentityStore {
    path: PathBuf,
    table: Mutex<IdentityTable>,
}

impl JsonFileIdentityStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match async_fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IdentityTable::default(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &IdentityTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut IdentityTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let result = apply(&mut next)?;
        self.persist(&next).await?;
        *table = next;
        Ok(result)
    }
}

#[async_trait]
impl IdentityStore for JsonFileIdentityStore {
    async fn create(&self, api_token: String) -> Result<Identity, StoreError> {
        self.mutate(|table| table.create(api_token)).await
    }

    async fn load(&self, id: u64) -> Result<Option<Identity>, StoreError> {
        Ok(self.table.lock().await.load(id))
    }

    async fn find_by_api_token(&self, api_token: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.table.lock().await.find_by_api_token(api_token))
    }

    async fn update_credentials(
        &self,
        id: u64,
        credentials: &SpotifyCredentials,
    ) -> Result<(), StoreError> {
        self.mutate(|table| table.update_credentials(id, credentials))
            .await
    }

    async fn soft_delete(&self, id: u64) -> Result<(), StoreError> {
        self.mutate(|table| table.soft_delete(id)).await
    }
}
