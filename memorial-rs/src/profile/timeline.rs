//! Combined public timeline of photos, videos and guestbook comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::comments::Comment;
use crate::registry::MediaItem;

/// One entry of the public timeline, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry {
    Photo(MediaItem),
    Video(MediaItem),
    Comment(Comment),
}

impl TimelineEntry {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TimelineEntry::Photo(item) | TimelineEntry::Video(item) => item.created_at,
            TimelineEntry::Comment(comment) => Some(comment.created_at),
        }
    }
}

/// Merge everything into one list, newest first. Undated media items are
/// left out.
pub fn merge_timeline(
    photos: Vec<MediaItem>,
    videos: Vec<MediaItem>,
    comments: Vec<Comment>,
) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = photos
        .into_iter()
        .map(TimelineEntry::Photo)
        .chain(videos.into_iter().map(TimelineEntry::Video))
        .chain(comments.into_iter().map(TimelineEntry::Comment))
        .filter(|entry| entry.created_at().is_some())
        .collect();

    entries.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn media(id: &str, created_at: Option<DateTime<Utc>>) -> MediaItem {
        let mut item = MediaItem::new(format!("memory://{}", id), id.to_string(), 10);
        item.created_at = created_at;
        item
    }

    fn comment(id: &str, minute: u32) -> Comment {
        Comment {
            id: id.to_string(),
            author: "Ana".to_string(),
            message: "Siempre".to_string(),
            created_at: at(minute),
            updated_at: None,
        }
    }

    fn ids(entries: &[TimelineEntry]) -> Vec<&str> {
        entries
            .iter()
            .map(|entry| match entry {
                TimelineEntry::Photo(item) | TimelineEntry::Video(item) => item.external_id.as_str(),
                TimelineEntry::Comment(comment) => comment.id.as_str(),
            })
            .collect()
    }

    #[test]
    fn test_interleaved_newest_first() {
        let entries = merge_timeline(
            vec![media("p1", Some(at(1))), media("p2", Some(at(4)))],
            vec![media("v1", Some(at(3)))],
            vec![comment("c1", 5), comment("c2", 2)],
        );

        assert_eq!(ids(&entries), vec!["c1", "p2", "v1", "c2", "p1"]);
        assert!(matches!(entries[1], TimelineEntry::Photo(_)));
        assert!(matches!(entries[2], TimelineEntry::Video(_)));
    }

    #[test]
    fn test_undated_media_skipped() {
        let entries = merge_timeline(
            vec![media("p1", None), media("p2", Some(at(0)))],
            vec![media("v1", None)],
            Vec::new(),
        );
        assert_eq!(ids(&entries), vec!["p2"]);
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let value = serde_json::to_value(TimelineEntry::Comment(comment("c1", 0))).unwrap();
        assert_eq!(value["type"], "comment");
        assert_eq!(value["author"], "Ana");

        let value = serde_json::to_value(TimelineEntry::Video(media("v1", Some(at(0))))).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["external_id"], "v1");
    }
}
