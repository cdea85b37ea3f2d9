// Post handlers
// HTTP handlers for the posts collection

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use crate::{
    auth::Access,
    error::ApiError,
    models::post::CreatePostRequest,
    state::AppState,
};

/// Create a new post
/// POST /posts
///
/// The body is parsed by hand so that malformed JSON and a missing title
/// both come back as 400 rather than the extractor's 415/422.
pub async fn create_post(
    State(state): State<AppState>,
    access: Option<Extension<Access>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreatePostRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Request body must be a JSON object: {}", e)))?;

    let new_post = request.into_new_post().map_err(ApiError::Validation)?;

    if let Some(Extension(Access::Metered { owner_id, .. })) = access {
        info!("Creating new post for key owner {} with title: {}", owner_id, new_post.title);
    } else {
        info!("Creating new post with title: {}", new_post.title);
    }

    let post = state.posts.append(new_post).await?;

    info!("Successfully created post with id: {}", post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

/// Get all posts
/// GET /posts
pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching all posts");

    let posts = state.posts.list().await?;

    info!("Retrieved {} posts", posts.len());
    Ok((StatusCode::OK, Json(posts)))
}

/// CORS preflight
/// OPTIONS /posts
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /posts
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
