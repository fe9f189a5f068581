use crate::error::{MemorialError, Result};
use crate::quota::QuotaLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `MEMORIAL__AUTH__JWT_SECRET`
pub const ENV_PREFIX: &str = "MEMORIAL";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub profile: ProfileConfig,
    pub quota: QuotaLimits,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileConfig {
    /// Identifier of the single profile served by this deployment
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaProvider {
    /// In-process media host, nothing leaves the server
    Memory,
    Cloudinary,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    pub provider: MediaProvider,
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Remote folder root; photos and videos go to `<root>/photos` and `<root>/videos`
    pub folder_root: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemorialError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| MemorialError::Config(e.to_string()))
    }

    /// Load defaults, then the optional TOML file, then `MEMORIAL__*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| MemorialError::Config(e.to_string()))?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| MemorialError::Config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| MemorialError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.profile.id.trim().is_empty() {
            return Err(MemorialError::Config("profile.id must not be empty".to_string()));
        }
        if self.quota.storage_limit == 0 {
            return Err(MemorialError::Config(
                "quota.storage_limit must be positive".to_string(),
            ));
        }
        if self.media.provider == MediaProvider::Cloudinary
            && (self.media.cloud_name.is_none()
                || self.media.api_key.is_none()
                || self.media.api_secret.is_none())
        {
            return Err(MemorialError::Config(
                "cloudinary provider requires cloud_name, api_key and api_secret".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest JSON request body the API accepts: a base64 video at the cap plus slack
    pub fn max_request_body(&self) -> usize {
        let largest = self.quota.max_video_size.max(self.quota.max_photo_size);
        (largest as usize / 3 + 1) * 4 + 64 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
            },
            profile: ProfileConfig {
                id: "public".to_string(),
            },
            quota: QuotaLimits::default(),
            storage: StorageConfig {
                database_url: "sqlite://memorial.db?mode=rwc".to_string(),
            },
            media: MediaConfig {
                provider: MediaProvider::Memory,
                cloud_name: None,
                api_key: None,
                api_secret: None,
                folder_root: "kora".to_string(),
                timeout_secs: 120,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_ttl_hours: 24,
                database_url: "sqlite://memorial.db?mode=rwc".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.profile.id, "public");
        assert_eq!(config.quota.storage_limit, 400 * 1024 * 1024);
    }

    #[test]
    fn test_cloudinary_requires_credentials() {
        let mut config = Config::default();
        config.media.provider = MediaProvider::Cloudinary;
        assert!(config.validate().is_err());

        config.media.cloud_name = Some("demo".to_string());
        config.media.api_key = Some("key".to_string());
        config.media.api_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_roundtrips_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = toml::to_string(&Config::default()).unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.quota.max_description_len, 500);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/memorial-config.toml").unwrap();
        assert_eq!(config.media.folder_root, "kora");
    }

    #[test]
    fn test_max_request_body_covers_base64_video() {
        let config = Config::default();
        assert!(config.max_request_body() as u64 > config.quota.max_video_size * 4 / 3);
    }
}
