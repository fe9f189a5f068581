//! JWT Authentication for REST API

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::security::{Identity, Role};

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.role)
    }
}

/// JWT configuration
pub struct JwtConfig {
    /// Secret key for signing tokens
    secret: String,
    /// Token expiration duration
    expiration: Duration,
}

impl JwtConfig {
    pub fn new(secret: String, expiration_hours: u64) -> Self {
        Self {
            secret,
            expiration: Duration::from_secs(expiration_hours * 3600),
        }
    }

    /// Create a new JWT token for a user
    pub fn create_token(&self, username: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp().max(0) as u64;

        let claims = Claims {
            sub: username.to_string(),
            role,
            exp: now + self.expiration.as_secs(),
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub fn expiration_secs(&self) -> u64 {
        self.expiration.as_secs()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::new("change-me-in-production".to_string(), 24)
    }
}
