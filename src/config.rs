//! Configuration management for the `AeroDex` service
//!
//! Handles loading configuration from an optional file and environment
//! variables, and provides validation for all configuration settings.

use crate::AeroDexError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `AeroDex` service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeroDexConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream provider settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Audit log store settings
    #[serde(default)]
    pub audit: AuditConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// The single origin allowed by CORS
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    /// Directory holding the plugin manifest, schema and logo
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
}

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL for METAR, TAF, PIREP, advisory and discussion data
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
    /// Base URL for the airport directory
    #[serde(default = "default_airports_base_url")]
    pub airports_base_url: String,
    /// Airport directory API key
    pub api_key: Option<String>,
    /// Request timeout in seconds, unset leaves the transport default
    pub timeout_seconds: Option<u64>,
}

/// Audit log store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Store URL (`mem://`, `ws://host:port`, `wss://...`); unset logs entries instead
    pub url: Option<String>,
    #[serde(default = "default_audit_namespace")]
    pub namespace: String,
    #[serde(default = "default_audit_database")]
    pub database: String,
    #[serde(default = "default_audit_table")]
    pub table: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_allowed_origin() -> String {
    "https://chat.openai.com".to_string()
}

fn default_asset_dir() -> String {
    "assets".to_string()
}

fn default_weather_base_url() -> String {
    "https://aviationweather.gov".to_string()
}

fn default_airports_base_url() -> String {
    "https://api.api-ninjas.com".to_string()
}

fn default_audit_namespace() -> String {
    "aerodex".to_string()
}

fn default_audit_database() -> String {
    "plugin".to_string()
}

fn default_audit_table() -> String {
    "logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
            asset_dir: default_asset_dir(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            weather_base_url: default_weather_base_url(),
            airports_base_url: default_airports_base_url(),
            api_key: None,
            timeout_seconds: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            url: None,
            namespace: default_audit_namespace(),
            database: default_audit_database(),
            table: default_audit_table(),
            username: None,
            password: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AeroDexConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AeroDexConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(std::env::var("AERODEX_CONFIG").ok().map(PathBuf::from))
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| PathBuf::from("config.toml"));

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with AERODEX_ prefix
        builder = builder.add_source(
            Environment::with_prefix("AERODEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Plain variables the plugin deployment has always used
        builder = builder
            .set_override_option("server.port", std::env::var("PORT").ok())
            .with_context(|| "Failed to apply PORT")?
            .set_override_option("upstream.api_key", std::env::var("AIRPORTS_API_KEY").ok())
            .with_context(|| "Failed to apply AIRPORTS_API_KEY")?
            .set_override_option("audit.url", std::env::var("AUDIT_STORE_URL").ok())
            .with_context(|| "Failed to apply AUDIT_STORE_URL")?;

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: AeroDexConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Socket address string the server binds to
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_api_key(&self) -> Result<()> {
        if let Some(api_key) = &self.upstream.api_key {
            if api_key.trim().is_empty() {
                return Err(AeroDexError::config(
                    "Airport API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }
        }

        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if let Some(timeout) = self.upstream.timeout_seconds {
            if timeout == 0 || timeout > 300 {
                return Err(AeroDexError::config(
                    "Upstream timeout must be between 1 and 300 seconds",
                )
                .into());
            }
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AeroDexError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AeroDexError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather", &self.upstream.weather_base_url),
            ("Airport", &self.upstream.airports_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AeroDexError::config(format!(
                    "{name} API base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.server.allowed_origin.trim().is_empty() {
            return Err(AeroDexError::config("CORS origin cannot be empty").into());
        }

        Ok(())
    }
}
