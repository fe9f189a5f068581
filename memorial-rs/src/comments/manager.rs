//! Comment manager - guestbook storage in SQLite

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::types::{Comment, CreateCommentRequest, UpdateCommentRequest};
use crate::error::{MemorialError, Result};
use crate::quota::QuotaPolicy;
use crate::security::Identity;

/// Manages guestbook comments
#[derive(Clone)]
pub struct CommentManager {
    db: SqlitePool,
    policy: QuotaPolicy,
}

impl CommentManager {
    pub fn new(db: SqlitePool, policy: QuotaPolicy) -> Self {
        Self { db, policy }
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                author TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_comments_created
            ON comments(created_at)
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn create(&self, identity: &Identity, request: CreateCommentRequest) -> Result<Comment> {
        identity.require_admin()?;

        let author = request.author.trim();
        let message = request.message.trim();
        self.policy.validate_comment(author, message)?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            author: author.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO comments (id, author, message, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.author)
        .bind(&comment.message)
        .bind(format_timestamp(&comment.created_at))
        .execute(&self.db)
        .await?;

        info!("Comment {} by {} added", comment.id, comment.author);
        Ok(comment)
    }

    /// All comments, newest first
    pub async fn list(&self) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, author, message, created_at, updated_at
            FROM comments
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_comment).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<Comment>> {
        let row = sqlx::query(
            r#"
            SELECT id, author, message, created_at, updated_at
            FROM comments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_comment).transpose()
    }

    pub async fn update_message(
        &self,
        identity: &Identity,
        id: &str,
        request: UpdateCommentRequest,
    ) -> Result<Comment> {
        identity.require_admin()?;

        let message = request.message.trim();
        self.policy.validate_comment_message(message)?;

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(message)
        .bind(format_timestamp(&Utc::now()))
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MemorialError::NotFound(format!("comment {}", id)));
        }

        info!("Comment {} edited by {}", id, identity.subject);
        self.get(id)
            .await?
            .ok_or_else(|| MemorialError::NotFound(format!("comment {}", id)))
    }

    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<()> {
        identity.require_admin()?;

        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MemorialError::NotFound(format!("comment {}", id)));
        }

        info!("Comment {} deleted by {}", id, identity.subject);
        Ok(())
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| MemorialError::Validation(format!("invalid timestamp {}: {}", value, e)))
}

fn row_to_comment(row: SqliteRow) -> Result<Comment> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: Option<String> = row.try_get("updated_at")?;

    Ok(Comment {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        message: row.try_get("message")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
