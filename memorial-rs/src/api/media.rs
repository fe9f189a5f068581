//! Media endpoints: upload, delete, caption edits and purge

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::auth::Claims;
use crate::api::handlers::{ApiResult, AppState};
use crate::error::MemorialError;
use crate::media::{decode_data_uri, DeleteOutcome, PurgeSummary};
use crate::registry::{MediaItem, MediaKind};

/// Upload body: the file travels as a base64 data URI
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file: String,
    pub description: Option<String>,
}

/// Media host identifiers contain slashes, so they travel in the body
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub external_id: String,
    pub description: String,
}

fn parse_kind(kind: &str) -> Result<MediaKind, MemorialError> {
    kind.parse().map_err(MemorialError::Validation)
}

/// POST /api/media/:kind
pub async fn upload(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(kind): Path<String>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<MediaItem> {
    let kind = parse_kind(&kind)?;
    let identity = claims.identity();
    identity.require_admin()?;

    let data = decode_data_uri(&req.file)?;
    let item = state
        .media
        .upload(&identity, kind, data, req.description.as_deref())
        .await?;
    Ok(Json(item))
}

/// POST /api/media/:kind/delete
pub async fn delete(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(kind): Path<String>,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<DeleteOutcome> {
    let kind = parse_kind(&kind)?;
    let outcome = state
        .media
        .delete(&claims.identity(), kind, &req.external_id)
        .await?;
    Ok(Json(outcome))
}

/// PATCH /api/media/:kind/description
pub async fn update_description(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(kind): Path<String>,
    Json(req): Json<DescriptionRequest>,
) -> ApiResult<MediaItem> {
    let kind = parse_kind(&kind)?;
    let item = state
        .media
        .update_description(&claims.identity(), kind, &req.external_id, &req.description)
        .await?;
    Ok(Json(item))
}

/// POST /api/media/purge
pub async fn purge(State(state): State<Arc<AppState>>, claims: Claims) -> ApiResult<PurgeSummary> {
    Ok(Json(state.media.purge(&claims.identity()).await?))
}
