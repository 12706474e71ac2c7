//! Configuration module for cloudshelf.

use serde::Deserialize;
use std::path::Path;

use crate::{CloudshelfError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Shared secret used to verify bearer tokens (must be set).
    #[serde(default)]
    pub jwt_secret: String,
    /// Maximum upload request size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_size() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl ServerConfig {
    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: `s3` or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// S3 endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// S3 region name.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket holding every tenant's objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style addressing (required by MinIO).
    #[serde(default = "default_true")]
    pub path_style: bool,
    /// Create the bucket at startup when it is missing.
    #[serde(default = "default_true")]
    pub create_bucket: bool,
    /// Text before the tenant id in every key.
    #[serde(default = "default_user_prefix")]
    pub user_prefix: String,
    /// Text after the tenant id in every key; must end with `/`.
    #[serde(default = "default_user_suffix")]
    pub user_suffix: String,
}

fn default_backend() -> String {
    "s3".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    "user-files".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_prefix() -> String {
    "user-".to_string()
}

fn default_user_suffix() -> String {
    "-files/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: default_endpoint(),
            region: default_region(),
            bucket: default_bucket(),
            access_key: String::new(),
            secret_key: String::new(),
            path_style: default_true(),
            create_bucket: default_true(),
            user_prefix: default_user_prefix(),
            user_suffix: default_user_suffix(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cloudshelf.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CloudshelfError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CloudshelfError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CLOUDSHELF_JWT_SECRET`: Override the JWT secret key
    /// - `CLOUDSHELF_S3_ACCESS_KEY`: Override the storage access key
    /// - `CLOUDSHELF_S3_SECRET_KEY`: Override the storage secret key
    pub fn apply_env_overrides(&mut self) {
        override_from_env("CLOUDSHELF_JWT_SECRET", &mut self.server.jwt_secret);
        override_from_env("CLOUDSHELF_S3_ACCESS_KEY", &mut self.storage.access_key);
        override_from_env("CLOUDSHELF_S3_SECRET_KEY", &mut self.storage.secret_key);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.jwt_secret.is_empty() {
            return Err(CloudshelfError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via CLOUDSHELF_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.server.max_upload_size_mb == 0 {
            return Err(CloudshelfError::Config(
                "max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        if !matches!(self.storage.backend.as_str(), "s3" | "memory") {
            return Err(CloudshelfError::Config(format!(
                "unknown storage backend: {}",
                self.storage.backend
            )));
        }
        if self.storage.bucket.is_empty() {
            return Err(CloudshelfError::Config("bucket is not set".to_string()));
        }
        if !self.storage.user_suffix.ends_with('/') {
            return Err(CloudshelfError::Config(
                "user_suffix must end with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_from_env(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *target = value;
        }
    }
}
