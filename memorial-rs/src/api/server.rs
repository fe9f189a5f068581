//! API Server - HTTP server for the memorial page

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::auth::{Claims, JwtConfig};
use crate::api::handlers::{self, ApiError, AppState};
use crate::api::{comments, media, usage};
use crate::comments::CommentManager;
use crate::config::{Config, MediaConfig, MediaProvider};
use crate::error::{MemorialError, Result};
use crate::ledger::UsageLedger;
use crate::media::MediaService;
use crate::observer::UsageObserver;
use crate::profile::ProfileService;
use crate::quota::QuotaPolicy;
use crate::registry::MediaRegistry;
use crate::security::Authenticator;
use crate::store::{DocumentStore, SqliteDocumentStore};
use crate::transport::{CloudinaryTransport, MediaTransport, MemoryTransport};

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    body_limit: usize,
}

impl ApiServer {
    pub fn new(state: AppState, addr: String, body_limit: usize) -> Self {
        Self {
            state: Arc::new(state),
            addr,
            body_limit,
        }
    }

    /// Wire stores, services and the media transport from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let policy = QuotaPolicy::new(config.quota.clone());
        let profile_id = config.profile.id.clone();

        let sqlite = SqliteDocumentStore::connect(&config.storage.database_url).await?;
        let comments = CommentManager::new(sqlite.pool().clone(), policy.clone());
        comments.init_db().await?;

        let store: Arc<dyn DocumentStore> = Arc::new(sqlite);
        let registry = MediaRegistry::new(store.clone(), policy.clone());
        let observer = UsageObserver::new(config.quota.storage_limit);
        let ledger = UsageLedger::new(store.clone(), registry.clone(), observer);

        if let Some(drift) = ledger.check_drift(&profile_id).await? {
            warn!("{} at startup; run a reconciliation to repair", drift);
        }

        let transport = build_transport(&config.media)?;
        info!("Media transport: {}", transport.name());

        let state = AppState {
            authenticator: Authenticator::new(&config.auth.database_url).await?,
            jwt_config: JwtConfig::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_hours),
            profile: ProfileService::new(
                profile_id.clone(),
                store.clone(),
                registry.clone(),
                ledger.clone(),
                comments.clone(),
                policy.clone(),
            ),
            media: MediaService::new(profile_id.clone(), policy, registry, ledger.clone(), transport),
            comments,
            ledger,
            store,
            profile_id,
        };

        Ok(Self::new(
            state,
            config.server.listen_addr.clone(),
            config.max_request_body(),
        ))
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        // Public routes (no auth required)
        let public_routes = Router::new()
            .route("/health", get(handlers::health))
            .route("/auth/login", post(handlers::login))
            .route("/profile", get(handlers::get_profile))
            .route("/profile/photos", get(handlers::list_photos))
            .route("/profile/videos", get(handlers::list_videos))
            .route("/profile/timeline", get(handlers::timeline))
            .route("/comments", get(comments::list));

        // Protected routes (auth required, roles checked by the services)
        let protected_routes = Router::new()
            .route("/usage", get(usage::get_usage))
            .route("/usage/stream", get(usage::stream_usage))
            .route("/profile/biography", put(handlers::update_biography))
            .route("/media/purge", post(media::purge))
            .route("/media/:kind", post(media::upload))
            .route("/media/:kind/delete", post(media::delete))
            .route("/media/:kind/description", patch(media::update_description))
            .route("/admin/reconcile", post(handlers::reconcile))
            .route("/comments", post(comments::create))
            .route("/comments/:id", put(comments::update))
            .route("/comments/:id", delete(comments::delete))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ));

        Router::new()
            .nest("/api", public_routes.merge(protected_routes))
            .layer(DefaultBodyLimit::max(self.body_limit))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Pick the media host named in configuration
pub fn build_transport(config: &MediaConfig) -> Result<Arc<dyn MediaTransport>> {
    match config.provider {
        MediaProvider::Memory => Ok(Arc::new(MemoryTransport::new(config.folder_root.clone()))),
        MediaProvider::Cloudinary => {
            let required = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .ok_or_else(|| MemorialError::Config(format!("media.{} is required for cloudinary", name)))
            };

            let transport = CloudinaryTransport::new(
                required(&config.cloud_name, "cloud_name")?,
                required(&config.api_key, "api_key")?,
                required(&config.api_secret, "api_secret")?,
                config.folder_root.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(transport))
        }
    }
}

/// Authentication middleware - validates JWT token
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            warn!("Missing or invalid Authorization header");
            return ApiError::unauthorized("Missing or invalid Authorization header").into_response();
        }
    };

    match state.jwt_config.validate_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!("Invalid JWT token: {}", e);
            ApiError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

/// Extract Claims from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
