use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    error::{ApiError, ApiResult},
    models::{ApiKeyRecord, NewPost, Post, PostId, SeedApiKey},
    store::{ApiKeyStore, PostStore},
};

/// Process-local store.
///
/// Lives as long as the process: created at startup, shared through `Arc`,
/// and gone on restart. Nothing is synchronized across instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: RwLock<Vec<Post>>,
    api_keys: RwLock<Vec<ApiKeyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of posts
    pub fn with_posts(posts: Vec<Post>) -> Self {
        MemoryStore {
            posts: RwLock::new(posts),
            api_keys: RwLock::new(Vec::new()),
        }
    }

    /// Provision API keys; record ids are their position in the seed list
    pub fn with_api_keys(self, seeds: Vec<SeedApiKey>) -> Self {
        let records = seeds
            .into_iter()
            .enumerate()
            .map(|(index, seed)| ApiKeyRecord {
                id: (index + 1).to_string(),
                owner_id: seed.owner,
                key: seed.key,
                usage: seed.usage,
            })
            .collect::<Vec<_>>();

        info!("Provisioned {} in-memory API keys", records.len());

        MemoryStore {
            posts: self.posts,
            api_keys: RwLock::new(records),
        }
    }

    /// Current usage of a key, if it exists
    pub async fn usage_of(&self, key: &str) -> Option<i64> {
        self.api_keys
            .read()
            .await
            .iter()
            .find(|record| record.key == key)
            .map(|record| record.usage)
    }

    /// Remove a key record, as an external deprovisioning would
    #[cfg(test)]
    pub async fn revoke_api_key(&self, key: &str) -> bool {
        let mut keys = self.api_keys.write().await;
        let before = keys.len();
        keys.retain(|record| record.key != key);
        keys.len() != before
    }
}

/// Next integer id: one past the largest existing numeric id, or 1
fn next_post_id(posts: &[Post]) -> i64 {
    posts
        .iter()
        .filter_map(|post| post.id.as_number())
        .max()
        .map_or(1, |max| max + 1)
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn list(&self) -> ApiResult<Vec<Post>> {
        Ok(self.posts.read().await.clone())
    }

    async fn append(&self, post: NewPost) -> ApiResult<Post> {
        let mut posts = self.posts.write().await;

        let id = next_post_id(&posts);
        let created = post.into_post(PostId::Number(id), None);
        posts.push(created.clone());

        debug!("Appended in-memory post with id: {}", id);
        Ok(created)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> ApiResult<Option<ApiKeyRecord>> {
        Ok(self
            .api_keys
            .read()
            .await
            .iter()
            .find(|record| record.key == key)
            .cloned())
    }

    async fn increment_usage(&self, record: &ApiKeyRecord, quota: i64) -> ApiResult<i64> {
        // The write lock makes the re-read and the increment one step
        let mut keys = self.api_keys.write().await;

        let current = keys
            .iter_mut()
            .find(|candidate| candidate.id == record.id)
            .ok_or_else(|| {
                ApiError::database(format!("API key record {} no longer exists", record.id))
            })?;

        if current.is_exhausted(quota) {
            return Err(ApiError::QuotaExceeded { quota });
        }

        current.usage += 1;
        Ok(current.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            acceleration_x: None,
            acceleration_y: None,
            acceleration_z: None,
            latitude: None,
            longitude: None,
        }
    }

    fn seed(owner: &str, key: &str, usage: i64) -> SeedApiKey {
        SeedApiKey {
            owner: owner.to_string(),
            key: key.to_string(),
            usage,
        }
    }

    #[test]
    fn test_first_post_gets_id_one() {
        let store = MemoryStore::new();
        let post = tokio_test::block_on(store.append(new_post("first"))).unwrap();

        assert_eq!(post.id, PostId::Number(1));
        assert_eq!(post.title, "first");
        assert_eq!(post.created_at, None);
    }

    #[test]
    fn test_next_id_follows_maximum() {
        let existing = vec![
            new_post("a").into_post(PostId::Number(3), None),
            new_post("b").into_post(PostId::Number(10), None),
            new_post("c").into_post(PostId::Number(7), None),
        ];
        let store = MemoryStore::with_posts(existing);

        let post = tokio_test::block_on(store.append(new_post("d"))).unwrap();
        assert_eq!(post.id, PostId::Number(11));
    }

    #[tokio::test]
    async fn test_list_grows_with_appends() {
        let store = MemoryStore::new();
        assert!(store.list().await.unwrap().is_empty());

        for title in ["one", "two", "three"] {
            store.append(new_post(title)).await.unwrap();
        }

        let posts = store.list().await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
        let ids: Vec<_> = posts.iter().filter_map(|p| p.id.as_number()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_find_by_key_across_owners() {
        let store = MemoryStore::new()
            .with_api_keys(vec![seed("alice", "k-alice", 0), seed("bob", "k-bob", 2)]);

        let record = store.find_by_key("k-bob").await.unwrap().unwrap();
        assert_eq!(record.owner_id, "bob");
        assert_eq!(record.usage, 2);

        assert!(store.find_by_key("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_usage_and_quota() {
        let store = MemoryStore::new().with_api_keys(vec![seed("alice", "k", 3)]);
        let record = store.find_by_key("k").await.unwrap().unwrap();

        assert_eq!(store.increment_usage(&record, 5).await.unwrap(), 4);
        assert_eq!(store.increment_usage(&record, 5).await.unwrap(), 5);

        let err = store.increment_usage(&record, 5).await.unwrap_err();
        assert!(matches!(err, ApiError::QuotaExceeded { quota: 5 }));
        assert_eq!(store.usage_of("k").await, Some(5));
    }

    #[tokio::test]
    async fn test_increment_fails_for_revoked_key() {
        let store = MemoryStore::new().with_api_keys(vec![seed("alice", "k", 0)]);
        let record = store.find_by_key("k").await.unwrap().unwrap();

        assert!(store.revoke_api_key("k").await);
        let err = store.increment_usage(&record, 5).await.unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new().with_api_keys(vec![seed("alice", "k", 0)]));
        let record = store.find_by_key("k").await.unwrap().unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                store.increment_usage(&record, 100).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.usage_of("k").await, Some(4));
    }
}
