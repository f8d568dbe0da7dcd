//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` and can be set with the
//! `-f` flag or `PICKCTL_CONFIG`. Environment variables prefixed with
//! `PICKCTL_` override file values (`PICKCTL_PORT=9000`,
//! `PICKCTL_PICK_TIMEOUT_MINUTES=15`, ...); `DATABASE_URL` overrides the
//! database path.
//!
//! All tunables carry the defaults and bounds of the coordinator contract:
//! token lifetimes, the reaper's idle timeout / retention / interval, and the
//! scan-to-count threshold.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::Error;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PICKCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Path of the SQLite database file
    pub database_path: PathBuf,
    /// Secret key for JWT signing. Override the default outside development.
    pub secret_key: String,
    /// Username for the initial admin user (created iff no admin exists)
    pub admin_username: String,
    /// Password for the initial admin user
    pub admin_password: String,
    /// Access token lifetime in minutes (1-1440)
    pub access_token_ttl_minutes: i64,
    /// Refresh token lifetime in days (1-90)
    pub refresh_token_ttl_days: i64,
    /// Idle minutes after which the reaper releases an in-progress claim (5-480)
    pub pick_timeout_minutes: i64,
    /// Whether the reaper performs any work on its ticks
    pub auto_cleanup_enabled: bool,
    /// Hours a completed request is retained before purging (1-720)
    pub auto_cleanup_hours: i64,
    /// Minutes between reaper passes (5-1440)
    pub cleanup_interval_minutes: i64,
    /// Per-item requested-qty boundary between scan-to-count and bulk entry (1-100)
    pub auto_mode_threshold: i64,
    /// Directory for completion log files
    pub log_directory: PathBuf,
    /// Path of the product catalog JSON file
    pub products_file: PathBuf,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: PathBuf::from("storage/db/warehouse.db"),
            // Development-only fallback; override in any real deployment.
            secret_key: "insecure-dev-secret-change-me".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 7,
            pick_timeout_minutes: 30,
            auto_cleanup_enabled: true,
            auto_cleanup_hours: 24,
            cleanup_interval_minutes: 60,
            auto_mode_threshold: 10,
            log_directory: PathBuf::from("storage/logs"),
            products_file: PathBuf::from("data/products.json"),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("PICKCTL_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database_path".into()))
    }

    /// Validate tunables against their documented bounds.
    pub fn validate(&self) -> Result<(), Error> {
        let checks = [
            ("access_token_ttl_minutes", self.access_token_ttl_minutes, 1, 1440),
            ("refresh_token_ttl_days", self.refresh_token_ttl_days, 1, 90),
            ("pick_timeout_minutes", self.pick_timeout_minutes, 5, 480),
            ("auto_cleanup_hours", self.auto_cleanup_hours, 1, 720),
            ("cleanup_interval_minutes", self.cleanup_interval_minutes, 5, 1440),
            ("auto_mode_threshold", self.auto_mode_threshold, 1, 100),
        ];

        for (field, value, min, max) in checks {
            if value < min || value > max {
                return Err(Error::Validation {
                    message: format!("Config: {field} must be between {min} and {max}, got {value}"),
                });
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_out_of_range_tunables_rejected() {
        let config = Config {
            pick_timeout_minutes: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            cleanup_interval_minutes: 10_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            auto_mode_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PICKCTL_PORT", "9000");
            jail.set_env("PICKCTL_PICK_TIMEOUT_MINUTES", "15");

            let args = Args {
                config: "missing.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load from env alone");
            assert_eq!(config.port, 9000);
            assert_eq!(config.pick_timeout_minutes, 15);
            Ok(())
        });
    }
}
