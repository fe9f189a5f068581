//! Guestbook endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::auth::Claims;
use crate::api::handlers::{ApiResult, AppState};
use crate::comments::{Comment, CreateCommentRequest, UpdateCommentRequest};
use crate::error::MemorialError;

/// GET /api/comments - Newest first
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Comment>> {
    Ok(Json(state.comments.list().await?))
}

/// POST /api/comments
pub async fn create(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), MemorialError> {
    let comment = state.comments.create(&claims.identity(), req).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /api/comments/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Comment> {
    Ok(Json(
        state.comments.update_message(&claims.identity(), &id, req).await?,
    ))
}

/// DELETE /api/comments/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<StatusCode, MemorialError> {
    state.comments.delete(&claims.identity(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
