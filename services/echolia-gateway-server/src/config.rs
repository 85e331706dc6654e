//! Server Configuration
//!
//! Configuration management for the Echolia gateway server. Supports
//! environment variables, an optional config file, and CLI overrides.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    pub database: echolia_db::DatabaseConfig,

    #[serde(default)]
    pub quota: QuotaSettings,

    #[serde(default)]
    pub crypto: CryptoSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("invalid socket address")
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Daily quota ceilings per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSettings {
    #[serde(default = "default_free_limit")]
    pub free_daily_limit: u32,

    #[serde(default = "default_elevated_limit")]
    pub elevated_daily_limit: u32,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            free_daily_limit: default_free_limit(),
            elevated_daily_limit: default_elevated_limit(),
        }
    }
}

/// Server identity / key rotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSettings {
    #[serde(default = "default_identity_path")]
    pub identity_path: String,

    #[serde(default = "default_key_rotation_secs")]
    pub key_rotation_period_secs: u64,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            identity_path: default_identity_path(),
            key_rotation_period_secs: default_key_rotation_secs(),
        }
    }
}

impl CryptoSettings {
    pub fn key_rotation_period(&self) -> Duration {
        Duration::from_secs(self.key_rotation_period_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_shutdown_timeout() -> u64 {
    15
}

fn default_free_limit() -> u32 {
    10
}

fn default_elevated_limit() -> u32 {
    100
}

fn default_identity_path() -> String {
    "./data/identity.bin".to_string()
}

fn default_key_rotation_secs() -> u64 {
    86_400 * 30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Load configuration from environment and an optional config file.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("ECHOLIA")
                    .separator("__")
                    .try_parsing(true),
            );

        let built = builder.build()?;

        let server_config: ServerConfig = built.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            ServerConfig::development()
        });

        Ok(server_config)
    }

    /// Configuration for local development.
    pub fn development() -> Self {
        Self {
            server: ServerSettings::default(),
            database: echolia_db::DatabaseConfig::default(),
            quota: QuotaSettings::default(),
            crypto: CryptoSettings::default(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::development()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_config_binds_to_the_documented_default_port() {
        let config = ServerConfig::development();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn socket_addr_parses_host_and_port() {
        let settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 9000,
            shutdown_timeout_secs: 5,
        };
        assert_eq!(settings.socket_addr().to_string(), "127.0.0.1:9000");
    }
}
