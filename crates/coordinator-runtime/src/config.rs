//! Typed configuration loaded from a YAML file with environment-variable
//! overrides (§6 "Configuration").
//!
//! Unknown keys are warnings (the underlying `config` crate simply
//! ignores them); missing required keys are fatal via `serde`'s
//! `#[serde(default)]`/required-field machinery.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("security.jwt_secret_key is missing or a placeholder; refusing to start")]
    PlaceholderJwtSecret,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, cors_origins: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Internal,
    Postgresql,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub kind: DatabaseType,
    pub url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseType::Internal,
            url: "sqlite://coordinator.db".to_string(),
            pool_min_size: 1,
            pool_max_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret_key: String,
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: i64,
}

fn default_token_expiry_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub rate_limit_per_minute: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { rate_limit_per_minute: 600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub repository_analysis: bool,
    pub auto_cleanup: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { repository_analysis: true, auto_cleanup: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub structured: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), structured: false }
    }
}

impl CoordinatorConfig {
    /// Loads `path` (YAML) layered under `PACSYNC_*` environment overrides,
    /// e.g. `PACSYNC_SERVER__PORT=9090`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PACSYNC").separator("__"))
            .build()?;
        let parsed: CoordinatorConfig = raw.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        const PLACEHOLDERS: &[&str] = &["", "changeme", "secret", "placeholder"];
        let secret = self.security.jwt_secret_key.trim();
        if secret.len() < 32 || PLACEHOLDERS.contains(&secret.to_lowercase().as_str()) {
            return Err(ConfigError::PlaceholderJwtSecret);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_config_binds_all_interfaces() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
    }

    #[test]
    fn rejects_short_jwt_secret() {
        let config = CoordinatorConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            security: SecurityConfig { jwt_secret_key: "too-short".to_string(), token_expiry_hours: 24 },
            api: ApiConfig::default(),
            features: FeatureConfig::default(),
            log: LogConfig::default(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::PlaceholderJwtSecret)));
    }

    #[test]
    fn accepts_sufficiently_long_jwt_secret() {
        let config = CoordinatorConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            security: SecurityConfig {
                jwt_secret_key: "a".repeat(32),
                token_expiry_hours: 24,
            },
            api: ApiConfig::default(),
            features: FeatureConfig::default(),
            log: LogConfig::default(),
        };
        assert!(config.validate().is_ok());
    }
}
