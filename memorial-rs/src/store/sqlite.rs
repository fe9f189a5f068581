//! SQLite-backed document store
//!
//! Profiles live in `profiles`, collection items in `media_items`. Insertion
//! order is kept by the `seq` column. Usage read-modify-writes run in a sqlx
//! [`Transaction`](sqlx::Transaction) that opens with a write, so concurrent
//! sessions serialize on SQLite's write lock instead of losing updates. A
//! transaction dropped before commit (a cancelled request) is rolled back.
//! Set removal is a single `DELETE ... RETURNING` statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use super::{DocumentStore, IncrementOutcome, ProfileDocument, ProfileField, UsageRecompute};
use crate::error::{MemorialError, Result};
use crate::registry::{MediaItem, MediaKind};

/// Open a SQLite pool, creating the database file if needed
pub async fn open_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // In-memory databases are private to a connection; keep one.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?)
}

/// Profile document store persisted in SQLite
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: SqlitePool,
}

impl SqliteDocumentStore {
    /// Wrap an existing pool. Call [`init_db`](Self::init_db) before use.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open a pool for `database_url` and create the tables
    pub async fn connect(database_url: &str) -> Result<Self> {
        let store = Self::new(open_pool(database_url).await?);
        store.init_db().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Initialize the profile tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                biography TEXT NOT NULL DEFAULT '',
                storage_used INTEGER,
                storage_version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media_items (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                external_id TEXT NOT NULL,
                locator TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                description TEXT,
                created_at TEXT,
                UNIQUE (profile_id, kind, external_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_profile ON media_items(profile_id, kind)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn insert_profile_if_absent(conn: &mut SqliteConnection, profile_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO profiles (id, created_at) VALUES (?, ?)")
            .bind(profile_id)
            .bind(Utc::now().to_rfc3339())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Bump the usage version, creating the profile if needed. Returns the
    /// usage value as it was and the new version.
    ///
    /// Run as the first statement of a usage transaction: being a write, it
    /// takes the database write lock before anything is read.
    async fn bump_usage_version(conn: &mut SqliteConnection, profile_id: &str) -> Result<(Option<i64>, i64)> {
        let row: (Option<i64>, i64) = sqlx::query_as(
            r#"
            INSERT INTO profiles (id, created_at, storage_version) VALUES (?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET storage_version = storage_version + 1
            RETURNING storage_used, storage_version
            "#,
        )
        .bind(profile_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }

    async fn write_usage(conn: &mut SqliteConnection, profile_id: &str, value: u64) -> Result<()> {
        sqlx::query("UPDATE profiles SET storage_used = ? WHERE id = ?")
            .bind(to_i64(value))
            .bind(profile_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn list_items(&self, profile_id: &str, kind: MediaKind) -> Result<Vec<MediaItem>> {
        let rows = sqlx::query(
            r#"
            SELECT external_id, locator, size_bytes, description, created_at
            FROM media_items
            WHERE profile_id = ? AND kind = ?
            ORDER BY seq
            "#,
        )
        .bind(profile_id)
        .bind(kind.to_db_string())
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_item).collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, profile_id: &str) -> Result<Option<ProfileDocument>> {
        let row = sqlx::query(
            "SELECT id, biography, storage_used, storage_version FROM profiles WHERE id = ?",
        )
            .bind(profile_id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let storage_used: Option<i64> = row.try_get("storage_used")?;
        let storage_version: i64 = row.try_get("storage_version")?;

        Ok(Some(ProfileDocument {
            id: row.try_get("id")?,
            biography: row.try_get("biography")?,
            photos: self.list_items(profile_id, MediaKind::Photo).await?,
            videos: self.list_items(profile_id, MediaKind::Video).await?,
            storage_used: storage_used.map(to_u64),
            storage_version: to_u64(storage_version),
        }))
    }

    async fn ensure_profile(&self, profile_id: &str) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        Self::insert_profile_if_absent(&mut conn, profile_id).await
    }

    async fn set_field(&self, profile_id: &str, field: ProfileField) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        Self::insert_profile_if_absent(&mut conn, profile_id).await?;

        match field {
            ProfileField::Biography(biography) => {
                sqlx::query("UPDATE profiles SET biography = ? WHERE id = ?")
                    .bind(biography)
                    .bind(profile_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn add_to_set(
        &self,
        profile_id: &str,
        kind: MediaKind,
        item: &MediaItem,
    ) -> Result<bool> {
        let mut conn = self.db.acquire().await?;
        Self::insert_profile_if_absent(&mut conn, profile_id).await?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO media_items (
                profile_id, kind, external_id, locator, size_bytes, description, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(profile_id)
        .bind(kind.to_db_string())
        .bind(&item.external_id)
        .bind(&item.locator)
        .bind(to_i64(item.size_bytes))
        .bind(&item.description)
        .bind(item.created_at.map(|t| t.to_rfc3339()))
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_from_set(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
    ) -> Result<Option<MediaItem>> {
        let row = sqlx::query(
            r#"
            DELETE FROM media_items
            WHERE profile_id = ? AND kind = ? AND external_id = ?
            RETURNING external_id, locator, size_bytes, description, created_at
            "#,
        )
        .bind(profile_id)
        .bind(kind.to_db_string())
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn update_description(
        &self,
        profile_id: &str,
        kind: MediaKind,
        external_id: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_items SET description = ?
            WHERE profile_id = ? AND kind = ? AND external_id = ?
            "#,
        )
        .bind(description)
        .bind(profile_id)
        .bind(kind.to_db_string())
        .bind(external_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn atomic_increment(&self, profile_id: &str, delta: i64) -> Result<IncrementOutcome> {
        let mut tx = self.db.begin().await?;

        let (previous, version) = Self::bump_usage_version(&mut *tx, profile_id).await?;
        let outcome = IncrementOutcome::apply(to_u64(previous.unwrap_or(0)), delta, to_u64(version));
        Self::write_usage(&mut *tx, profile_id, outcome.value).await?;

        tx.commit().await?;
        debug!("Usage of {} at {} (version {})", profile_id, outcome.value, outcome.version);
        Ok(outcome)
    }

    async fn recompute_usage(&self, profile_id: &str) -> Result<UsageRecompute> {
        let mut tx = self.db.begin().await?;

        let (previous, version) = Self::bump_usage_version(&mut *tx, profile_id).await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM media_items WHERE profile_id = ?",
        )
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await?;
        let value = to_u64(total);
        Self::write_usage(&mut *tx, profile_id, value).await?;

        tx.commit().await?;
        Ok(UsageRecompute {
            previous: previous.map(to_u64),
            value,
            version: to_u64(version),
        })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

fn row_to_item(row: &SqliteRow) -> Result<MediaItem> {
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let created_at: Option<String> = row.try_get("created_at")?;

    let created_at = created_at
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| MemorialError::Validation(format!("Invalid timestamp {}: {}", raw, e)))
        })
        .transpose()?;

    Ok(MediaItem {
        locator: row.try_get("locator")?,
        external_id: row.try_get("external_id")?,
        size_bytes: to_u64(size_bytes),
        description: row.try_get("description")?,
        created_at,
    })
}

/// SQLite integers are signed; byte counts never get near `i64::MAX`
fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
