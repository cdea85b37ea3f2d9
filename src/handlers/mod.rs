// Handlers module
// HTTP handlers for the REST API

pub mod posts;

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::{error::ApiError, state::AppState};

/// Health check handler
/// Returns "OK" with 200 status once the backing store answers
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.posts.health_check().await?;
    Ok((StatusCode::OK, "OK"))
}
