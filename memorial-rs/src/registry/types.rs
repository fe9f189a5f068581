//! Media item types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media attached to a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Video];

    /// Convert to database string
    pub fn to_db_string(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// Parse from database string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Resource type understood by the media host
    pub fn resource_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image",
            MediaKind::Video => "video",
        }
    }

    /// Remote sub-folder and collection name
    pub fn collection(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photos",
            MediaKind::Video => "videos",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Photo => "Photo",
            MediaKind::Video => "Video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    /// Accepts both the singular and the collection form (`photo`, `photos`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" | "photos" | "image" => Ok(MediaKind::Photo),
            "video" | "videos" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind: {}", other)),
        }
    }
}

/// A photo or video stored on the media host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Public URL on the media host
    pub locator: String,
    /// Opaque handle used to request deletion
    pub external_id: String,
    /// Size in bytes as reported by the media host
    pub size_bytes: u64,
    /// Optional caption
    pub description: Option<String>,
    /// Assigned at insertion when absent
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn new(locator: String, external_id: String, size_bytes: u64) -> Self {
        MediaItem {
            locator,
            external_id,
            size_bytes,
            description: None,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }
}
