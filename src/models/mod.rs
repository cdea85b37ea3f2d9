// Models module

pub mod api_key;
pub mod post;

// Re-export commonly used types
pub use api_key::{ApiKeyRecord, SeedApiKey};
pub use post::{CreatePostRequest, NewPost, Post, PostId};
