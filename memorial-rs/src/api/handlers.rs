//! API request handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::auth::{Claims, JwtConfig};
use crate::comments::CommentManager;
use crate::error::MemorialError;
use crate::ledger::{Reconciliation, UsageLedger};
use crate::media::MediaService;
use crate::profile::{ProfileService, ProfileView, TimelineEntry};
use crate::registry::{MediaItem, MediaKind};
use crate::security::{Authenticator, Role};
use crate::store::DocumentStore;

/// Shared application state
pub struct AppState {
    pub profile_id: String,
    pub authenticator: Authenticator,
    pub jwt_config: JwtConfig,
    pub store: Arc<dyn DocumentStore>,
    pub ledger: UsageLedger,
    pub profile: ProfileService,
    pub media: MediaService,
    pub comments: CommentManager,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub expires_in: u64,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(msg: &str, code: &str) -> Self {
        Self {
            error: msg.to_string(),
            code: code.to_string(),
        }
    }

    pub fn unauthorized(msg: &str) -> (StatusCode, Json<ApiError>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(msg, "unauthorized")))
    }
}

/// HTTP status for each failure kind
pub fn status_for(err: &MemorialError) -> StatusCode {
    match err {
        MemorialError::QuotaExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        MemorialError::Validation(_) | MemorialError::Base64(_) | MemorialError::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        MemorialError::Transport(_) => StatusCode::BAD_GATEWAY,
        MemorialError::NotFound(_) => StatusCode::NOT_FOUND,
        MemorialError::Unauthorized(_) | MemorialError::AuthenticationFailed => {
            StatusCode::UNAUTHORIZED
        }
        MemorialError::Forbidden(_) => StatusCode::FORBIDDEN,
        MemorialError::Io(_) | MemorialError::Config(_) | MemorialError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for MemorialError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiError::new(&message, self.code()))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, MemorialError>;

/// POST /api/auth/login - Authenticate and get JWT token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    match state.authenticator.authenticate(&req.username, &req.password).await {
        Ok(Some(role)) => match state.jwt_config.create_token(&req.username, role) {
            Ok(token) => (
                StatusCode::OK,
                Json(LoginResponse {
                    token,
                    username: req.username,
                    role,
                    expires_in: state.jwt_config.expiration_secs(),
                }),
            )
                .into_response(),
            Err(e) => {
                error!("Failed to create token: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiError::new("Failed to create token", "token_error")),
                )
                    .into_response()
            }
        },
        Ok(None) => MemorialError::AuthenticationFailed.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_healthy = state.authenticator.health_check().await.is_ok();
    let store_healthy = state.store.health_check().await.is_ok();

    let healthy = db_healthy && store_healthy;
    let status = if healthy { "healthy" } else { "unhealthy" };
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "service": "memorial-rs",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().timestamp(),
            "checks": {
                "auth_database": if db_healthy { "ok" } else { "failed" },
                "profile_store": if store_healthy { "ok" } else { "failed" },
                "media_transport": state.media.transport_name(),
            }
        })),
    )
}

/// GET /api/profile - Public memorial page
pub async fn get_profile(State(state): State<Arc<AppState>>) -> ApiResult<ProfileView> {
    Ok(Json(state.profile.get_profile().await?))
}

/// GET /api/profile/photos
pub async fn list_photos(State(state): State<Arc<AppState>>) -> ApiResult<Vec<MediaItem>> {
    Ok(Json(state.media.timeline(MediaKind::Photo).await?))
}

/// GET /api/profile/videos
pub async fn list_videos(State(state): State<Arc<AppState>>) -> ApiResult<Vec<MediaItem>> {
    Ok(Json(state.media.timeline(MediaKind::Video).await?))
}

/// GET /api/profile/timeline
pub async fn timeline(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TimelineEntry>> {
    Ok(Json(state.profile.timeline().await?))
}

#[derive(Debug, Deserialize)]
pub struct BiographyRequest {
    pub biography: String,
}

/// PUT /api/profile/biography
pub async fn update_biography(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(req): Json<BiographyRequest>,
) -> ApiResult<serde_json::Value> {
    let biography = state
        .profile
        .update_biography(&claims.identity(), &req.biography)
        .await?;
    Ok(Json(serde_json::json!({ "biography": biography })))
}

/// POST /api/admin/reconcile - Recompute the usage total from the registry
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> ApiResult<Reconciliation> {
    claims.identity().require_admin()?;
    Ok(Json(state.ledger.reconcile(&state.profile_id).await?))
}
