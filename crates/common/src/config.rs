//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration for the poll catalog and comments.
    pub database: DatabaseConfig,
    /// Vote storage configuration.
    #[serde(default)]
    pub votes: VoteStoreConfig,
    /// Placeholder avatar configuration.
    #[serde(default)]
    pub avatar: AvatarConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Which vote backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteBackendKind {
    /// Process-local map. Votes are lost on restart.
    #[default]
    Memory,
    /// Shared Redis instance.
    Redis,
}

/// Vote storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteStoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: VoteBackendKind,
    /// Redis connection URL (required when `backend = "redis"`).
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Key prefix for all Redis keys and channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Placeholder avatar settings used when a voter has no avatar.
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    /// Base URL of the placeholder avatar service.
    #[serde(default = "default_avatar_base_url")]
    pub base_url: String,
    /// Background colour (hex, no `#`).
    #[serde(default = "default_avatar_background")]
    pub background: String,
    /// Foreground colour (hex, no `#`).
    #[serde(default = "default_avatar_color")]
    pub color: String,
    /// Edge length in pixels.
    #[serde(default = "default_avatar_size")]
    pub size: u32,
}

impl Default for VoteStoreConfig {
    fn default() -> Self {
        Self {
            backend: VoteBackendKind::default(),
            redis_url: None,
            prefix: default_redis_prefix(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            base_url: default_avatar_base_url(),
            background: default_avatar_background(),
            color: default_avatar_color(),
            size: default_avatar_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "pollcast".to_string()
}

fn default_avatar_base_url() -> String {
    "https://ui-avatars.com/api/".to_string()
}

fn default_avatar_background() -> String {
    "6c63ff".to_string()
}

fn default_avatar_color() -> String {
    "fff".to_string()
}

const fn default_avatar_size() -> u32 {
    40
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `POLLCAST_ENV`)
    /// 3. Environment variables with `POLLCAST__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("POLLCAST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POLLCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLLCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
