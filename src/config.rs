use crate::app::reconcile::CategoryMatch;
use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub reconcile: ReconcileConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `libsql://…`/`https://…` for a remote Turso database, anything else is a local file path.
    pub url: String,
    pub auth_token: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "file:ranklist.db".to_string(),
            auth_token: None,
        }
    }
}

impl DatabaseConfig {
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("libsql://")
            || self.url.starts_with("https://")
            || self.url.starts_with("http://")
    }

    pub fn local_path(&self) -> &str {
        self.url.strip_prefix("file:").unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained refill rate per user. 0 disables limiting.
    pub requests_per_min: u64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_min: 60,
            burst: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub category_match: CategoryMatch,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9898,
        }
    }
}

impl Config {
    /// Load `config.toml` (or `RANKLIST_CONFIG`), falling back to defaults when
    /// the file does not exist, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("RANKLIST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else {
            info!("No config file at '{}', using defaults", path);
            Config::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("LIBSQL_URL") {
            self.database.url = url;
        }
        if let Ok(token) = env::var("LIBSQL_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }
        if let Ok(port) = env::var("RANKLIST_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RANKLIST_PORT is not a port: {port}")))?;
        }
        Ok(())
    }
}
