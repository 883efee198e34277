use std::sync::Arc;

use musicbox::{
    management::{IdentityStore, JsonFileIdentityStore, MemoryIdentityStore, StoreError},
    types::SpotifyCredentials,
};

fn credentials(access: &str, refresh: &str) -> SpotifyCredentials {
    SpotifyCredentials {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }
}

async fn json_store(dir: &tempfile::TempDir) -> JsonFileIdentityStore {
    JsonFileIdentityStore::open(dir.path().join("identities.json"))
        .await
        .expect("open store")
}

/// Checks shared by every store implementation.
async fn exercise_store(store: &dyn IdentityStore) {
    let first = store.create("token-a".to_string()).await.expect("create");
    let second = store.create("token-b".to_string()).await.expect("create");

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert!(!first.is_linked());
    assert_eq!(first.created_at, first.updated_at);

    // Duplicate bearer tokens are refused
    assert!(matches!(
        store.create("token-a".to_string()).await,
        Err(StoreError::DuplicateToken)
    ));

    let found = store
        .find_by_api_token("token-b")
        .await
        .expect("lookup")
        .expect("identity");
    assert_eq!(found.id, second.id);
    assert!(store.find_by_api_token("unknown").await.expect("lookup").is_none());

    // Updating credentials touches only the credential pair
    store
        .update_credentials(first.id, &credentials("access-1", "refresh-1"))
        .await
        .expect("update");
    let updated = store.load(first.id).await.expect("load").expect("identity");
    assert_eq!(updated.api_token, "token-a");
    assert_eq!(updated.created_at, first.created_at);
    assert_eq!(
        updated.spotify,
        Some(credentials("access-1", "refresh-1"))
    );
    assert!(updated.updated_at >= first.updated_at);

    let untouched = store.load(second.id).await.expect("load").expect("identity");
    assert!(untouched.spotify.is_none());

    assert!(matches!(
        store
            .update_credentials(99, &credentials("x", "y"))
            .await,
        Err(StoreError::NotFound(99))
    ));
}

#[tokio::test]
async fn test_memory_store_operations() {
    let store = MemoryIdentityStore::new();
    exercise_store(&store).await;
}

#[tokio::test]
async fn test_json_store_operations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = json_store(&dir).await;
    exercise_store(&store).await;
}

#[tokio::test]
async fn test_soft_deleted_identity_is_not_found_by_token() {
    let store = MemoryIdentityStore::new();
    let identity = store.create("token".to_string()).await.expect("create");

    store.soft_delete(identity.id).await.expect("delete");

    assert!(store.find_by_api_token("token").await.expect("lookup").is_none());
    let deleted = store.load(identity.id).await.expect("load").expect("identity");
    assert!(deleted.is_deleted());

    // The token of a deleted identity is still taken
    assert!(matches!(
        store.create("token".to_string()).await,
        Err(StoreError::DuplicateToken)
    ));
}

#[tokio::test]
async fn test_json_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("identities.json");

    {
        let store = JsonFileIdentityStore::open(&path).await.expect("open");
        let identity = store.create("token".to_string()).await.expect("create");
        store
            .update_credentials(identity.id, &credentials("access", "refresh"))
            .await
            .expect("update");
    }

    let store = JsonFileIdentityStore::open(&path).await.expect("reopen");
    let identity = store
        .find_by_api_token("token")
        .await
        .expect("lookup")
        .expect("identity");
    assert_eq!(identity.spotify, Some(credentials("access", "refresh")));

    // Ids continue after the highest persisted one
    let next = store.create("other".to_string()).await.expect("create");
    assert_eq!(next.id, identity.id + 1);
}

#[tokio::test]
async fn test_json_store_creates_missing_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("identities.json");

    let store = JsonFileIdentityStore::open(&path).await.expect("open");
    store.create("token".to_string()).await.expect("create");

    assert!(path.is_file());
}

#[tokio::test]
async fn test_json_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("identities.json");
    std::fs::write(&path, "not json").expect("write");

    assert!(matches!(
        JsonFileIdentityStore::open(&path).await,
        Err(StoreError::Serde(_))
    ));
}

#[tokio::test]
async fn test_concurrent_credential_updates_keep_one_pair() {
    let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
    let identity = store.create("token".to_string()).await.expect("create");

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let pair = credentials(&format!("access-{n}"), &format!("refresh-{n}"));
            store.update_credentials(identity.id, &pair).await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("update");
    }

    let stored = store
        .load(identity.id)
        .await
        .expect("load")
        .and_then(|i| i.spotify)
        .expect("credentials");
    // Access and refresh token always come from the same write
    assert_eq!(
        stored.access_token.trim_start_matches("access-"),
        stored.refresh_token.trim_start_matches("refresh-")
    );
}
