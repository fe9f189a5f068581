use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemorialError {
    #[error("Storage quota exceeded: {used} + {requested} bytes > {limit} bytes")]
    QuotaExceeded {
        used: u64,
        requested: u64,
        limit: u64,
    },

    #[error("Media transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl MemorialError {
    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Transport(_) => "transport_error",
            Self::Validation(_) | Self::Base64(_) => "validation_error",
            Self::Io(_) => "io_error",
            Self::Config(_) => "config_error",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Database(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Json(_) => "json_error",
        }
    }

    /// True for failures the user can fix or retry without operator help
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. }
                | Self::Transport(_)
                | Self::Validation(_)
                | Self::Base64(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MemorialError>;
