use std::sync::Arc;

use crate::{auth::AccessGate, store::PostStore};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostStore>,
    pub gate: AccessGate,
}

impl AppState {
    pub fn new(posts: Arc<dyn PostStore>, gate: AccessGate) -> Self {
        AppState { posts, gate }
    }

    /// In-memory posts with the gate left open
    #[cfg(test)]
    pub fn in_memory() -> Self {
        AppState::new(Arc::new(crate::store::MemoryStore::new()), AccessGate::Open)
    }
}
