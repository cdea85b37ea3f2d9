// Library root for the posts API

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use auth::{Access, AccessGate};
pub use error::{ApiError, ApiResult};
pub use models::{ApiKeyRecord, CreatePostRequest, NewPost, Post, PostId};
pub use state::AppState;
pub use store::{ApiKeyStore, MemoryStore, PgStore, PostStore};
