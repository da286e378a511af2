use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_seconds: i64,
    /// Upper bound on one password hash or verification.
    #[serde(default = "default_hash_timeout")]
    pub hash_timeout_ms: u64,
    /// Password hashes allowed to run at once, 64 MiB each.
    #[serde(default = "default_max_concurrent_hashes")]
    pub max_concurrent_hashes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            bucket: default_bucket(),
            max_image_bytes: default_max_image_bytes(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_token_expiry() -> i64 {
    3600 // 1 hour
}

fn default_hash_timeout() -> u64 {
    5000
}

fn default_max_concurrent_hashes() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage_root() -> String {
    "./data".to_string()
}

fn default_bucket() -> String {
    "ads".to_string()
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Environment variables that can override a config key, e.g.
/// `ADBOARD_AUTH__JWT_SECRET` for `auth.jwt_secret`.
const ENV_OVERRIDES: [(&str, &str); 12] = [
    ("ADBOARD_DATABASE__URL", "database.url"),
    ("ADBOARD_DATABASE__MAX_CONNECTIONS", "database.max_connections"),
    ("ADBOARD_AUTH__JWT_SECRET", "auth.jwt_secret"),
    ("ADBOARD_AUTH__TOKEN_EXPIRY_SECONDS", "auth.token_expiry_seconds"),
    ("ADBOARD_AUTH__HASH_TIMEOUT_MS", "auth.hash_timeout_ms"),
    ("ADBOARD_AUTH__MAX_CONCURRENT_HASHES", "auth.max_concurrent_hashes"),
    ("ADBOARD_SERVER__HOST", "server.host"),
    ("ADBOARD_SERVER__PORT", "server.port"),
    ("ADBOARD_STORAGE__ROOT", "storage.root"),
    ("ADBOARD_STORAGE__BUCKET", "storage.bucket"),
    ("ADBOARD_STORAGE__MAX_IMAGE_BYTES", "storage.max_image_bytes"),
    ("ADBOARD_STORAGE__MAX_BODY_BYTES", "storage.max_body_bytes"),
];

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Load configuration from adboard.toml in the current directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_file("adboard.toml")
    }

    /// Load configuration with environment variable overrides.
    ///
    /// `adboard.toml` is optional; anything it sets can be overridden by
    /// `ADBOARD_<SECTION>__<KEY>`. A `.env` file is read first if present.
    ///
    /// Returns the config and the keys that came from the environment.
    pub fn load_with_env() -> Result<(Self, Vec<String>), ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let config = Config::builder()
            .add_source(File::with_name("adboard").required(false))
            .add_source(
                Environment::with_prefix("ADBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let overrides = ENV_OVERRIDES
            .iter()
            .filter(|(env_var, _)| std::env::var(env_var).is_ok())
            .map(|(_, key)| key.to_string())
            .collect();

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok((app_config, overrides))
    }

    /// Reject values the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.token_expiry_seconds <= 0 {
            return Err(ConfigError::Message(
                "auth.token_expiry_seconds must be positive".into(),
            ));
        }
        if self.auth.hash_timeout_ms == 0 {
            return Err(ConfigError::Message("auth.hash_timeout_ms must be positive".into()));
        }
        if self.auth.max_concurrent_hashes == 0 {
            return Err(ConfigError::Message(
                "auth.max_concurrent_hashes must be positive".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.storage.max_image_bytes > self.storage.max_body_bytes {
            return Err(ConfigError::Message(
                "storage.max_image_bytes cannot exceed storage.max_body_bytes".into(),
            ));
        }
        Ok(())
    }
}
