//! Administrator accounts
//!
//! Credentials live in the `admin_users` table. Passwords are hashed with
//! Argon2 and never stored in clear.
//!
//! # Usage
//! ```no_run
//! use memorial_rs::security::{Authenticator, Role};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Authenticator::new("sqlite://memorial.db?mode=rwc").await?;
//!
//! auth.add_user("kora", "password123", Role::Admin).await?;
//!
//! let role = auth.authenticate("kora", "password123").await?;
//! assert_eq!(role, Some(Role::Admin));
//! # Ok(())
//! # }
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::identity::Role;
use crate::error::{MemorialError, Result};
use crate::store::open_pool;

/// Stored account, without the password hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Username/password authenticator backed by SQLite
#[derive(Clone)]
pub struct Authenticator {
    pub db: Arc<SqlitePool>,
}

impl Authenticator {
    /// Create a new authenticator
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = open_pool(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admin_users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'admin',
                created_at TEXT NOT NULL,
                last_login TEXT
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Add a new user
    ///
    /// # Security
    /// Password is hashed with Argon2 before storage
    pub async fn add_user(&self, username: &str, password: &str, role: Role) -> Result<()> {
        if username.trim().is_empty() {
            return Err(MemorialError::Validation("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(MemorialError::Validation("password must not be empty".to_string()));
        }

        info!("Adding {} user: {}", role, username);
        let password_hash = self.hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO admin_users (username, password_hash, role, created_at)
            VALUES (?, ?, ?, datetime('now'))
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(role.as_str())
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    /// Check credentials and return the user's role on success
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Role>> {
        debug!("Authentication attempt for {}", username);

        let row = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT password_hash, role
            FROM admin_users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await?;

        let Some((stored_hash, role)) = row else {
            warn!("Authentication failed: user not found: {}", username);
            return Ok(None);
        };

        let parsed_hash =
            PasswordHash::new(&stored_hash).map_err(|_e| MemorialError::AuthenticationFailed)?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("Authentication failed: invalid password for {}", username);
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE admin_users
            SET last_login = datetime('now')
            WHERE username = ?
            "#,
        )
        .bind(username)
        .execute(&*self.db)
        .await?;

        info!("Authentication successful for {}", username);
        Ok(Some(role.parse()?))
    }

    /// Role of an existing user
    pub async fn role_of(&self, username: &str) -> Result<Option<Role>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT role FROM admin_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&*self.db)
            .await?;

        row.map(|(role,)| role.parse()).transpose()
    }

    /// Hash password with Argon2
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| MemorialError::Config(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_users WHERE username = ?")
            .bind(username)
            .fetch_one(&*self.db)
            .await?;

        Ok(count.0 > 0)
    }

    /// Delete user. Returns false if no such user existed.
    pub async fn delete_user(&self, username: &str) -> Result<bool> {
        info!("Deleting user: {}", username);

        let result = sqlx::query("DELETE FROM admin_users WHERE username = ?")
            .bind(username)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users, newest first
    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            r#"
            SELECT username, role, created_at, last_login
            FROM admin_users
            ORDER BY created_at DESC, username
            "#,
        )
        .fetch_all(&*self.db)
        .await?;

        rows.into_iter()
            .map(|(username, role, created_at, last_login)| -> Result<UserRecord> {
                Ok(UserRecord {
                    username,
                    role: role.parse()?,
                    created_at,
                    last_login,
                })
            })
            .collect()
    }

    /// Health check - verify database connectivity
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_authenticate_user() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();

        auth.add_user("kora", "password123", Role::Admin).await.unwrap();

        let role = auth.authenticate("kora", "password123").await.unwrap();
        assert_eq!(role, Some(Role::Admin));

        let role = auth.authenticate("kora", "wrong").await.unwrap();
        assert_eq!(role, None);

        let role = auth.authenticate("nobody", "password123").await.unwrap();
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn test_roles_are_stored() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();
        auth.add_user("guest", "pw", Role::Visitor).await.unwrap();

        assert_eq!(auth.role_of("guest").await.unwrap(), Some(Role::Visitor));
        assert_eq!(auth.role_of("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();
        auth.add_user("kora", "pw", Role::Admin).await.unwrap();

        assert!(auth.add_user("kora", "other", Role::Admin).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_list_users() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();
        auth.add_user("kora", "pw", Role::Admin).await.unwrap();
        auth.add_user("guest", "pw", Role::Visitor).await.unwrap();

        let users = auth.list_users().await.unwrap();
        assert_eq!(users.len(), 2);

        assert!(auth.delete_user("guest").await.unwrap());
        assert!(!auth.delete_user("guest").await.unwrap());
        assert!(!auth.user_exists("guest").await.unwrap());
        assert!(auth.user_exists("kora").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();
        assert!(matches!(
            auth.add_user(" ", "pw", Role::Admin).await,
            Err(MemorialError::Validation(_))
        ));
        assert!(matches!(
            auth.add_user("kora", "", Role::Admin).await,
            Err(MemorialError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let auth = Authenticator::new("sqlite::memory:").await.unwrap();
        assert!(auth.health_check().await.is_ok());
    }
}
