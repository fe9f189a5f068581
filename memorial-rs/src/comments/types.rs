//! Guestbook comment types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message left on the memorial page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment ID (UUID)
    pub id: String,
    /// Display name of the person who wrote it
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to create a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub message: String,
}

/// Request to edit a comment's message
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentRequest {
    pub message: String,
}
