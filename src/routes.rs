use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::time::Duration;

use crate::{
    handlers::{
        health_check,
        posts::{create_post, list_posts, method_not_allowed, preflight},
    },
    middleware::{create_middleware_stack, require_api_key},
    state::AppState,
};

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let middleware = create_middleware_stack(state.gate.header_name(), request_timeout);

    let posts = get(list_posts)
        .post(create_post)
        .options(preflight)
        // `get` would otherwise answer HEAD as well
        .head(method_not_allowed)
        .fallback(method_not_allowed)
        // Applied to the fallback too, so the gate runs before the 405
        .layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_check))
        .route("/posts", posts)
        .with_state(state)
        .layer(middleware)
}
