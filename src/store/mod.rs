// Storage layer
// Post and API key persistence behind two small traits so the in-memory and
// PostgreSQL backends are interchangeable.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::ApiResult,
    models::{ApiKeyRecord, NewPost, Post},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for the posts collection
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts in creation order
    async fn list(&self) -> ApiResult<Vec<Post>>;

    /// Persist a new post, returning it with its assigned id
    async fn append(&self, post: NewPost) -> ApiResult<Post>;

    /// Liveness check for the backing storage
    async fn health_check(&self) -> ApiResult<()> {
        Ok(())
    }
}

/// Lookup and metering of API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find a key record by its key value across all owners
    async fn find_by_key(&self, key: &str) -> ApiResult<Option<ApiKeyRecord>>;

    /// Atomically re-read the record and bump its usage by one.
    ///
    /// Fails if the record has disappeared since it was looked up, and with
    /// `ApiError::QuotaExceeded` if the fresh usage already reached `quota`.
    /// Returns the usage after the increment.
    async fn increment_usage(&self, record: &ApiKeyRecord, quota: i64) -> ApiResult<i64>;
}
