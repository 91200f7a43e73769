//! Configuration module for the composition service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ScaleTable;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub providers: ProviderSettings,
    pub pipeline: PipelineSettings,
    pub export: ExportSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Endpoints of the extraction and background-removal webhooks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub extraction_url: String,
    pub background_removal_url: String,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    /// Largest image body the loader will download
    pub max_image_bytes: usize,
}

/// Knobs for the composition pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pause between the last composite and the `Ready` stage
    pub finalize_delay_ms: u64,
    /// Pixels with alpha at or below this value count as transparent when cropping
    pub alpha_threshold: u8,
    /// Sessions untouched for this long are discarded
    pub session_ttl_secs: u64,
    pub scales: ScaleTable,
}

impl PipelineSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Where downloads are mirrored to disk, if anywhere
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: Option<PathBuf>,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with TWINCREW_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // TWINCREW_SERVER__PORT, TWINCREW_PROVIDERS__EXTRACTION_URL, ...
            .add_source(
                Environment::with_prefix("TWINCREW")
                    .separator("__")
                    .try_parsing(true)
            );

        Self::from_config(builder.build()?)
    }

    /// Deserialize and validate an already-layered configuration
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .scales
            .validate()
            .map_err(|e| ConfigError::Message(format!("pipeline.scales: {}", e)))?;

        if self.pipeline.session_ttl_secs == 0 {
            return Err(ConfigError::Message("pipeline.session_ttl_secs must be positive".to_string()));
        }
        if self.providers.max_image_bytes == 0 {
            return Err(ConfigError::Message("providers.max_image_bytes must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            providers: ProviderSettings::default(),
            pipeline: PipelineSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            extraction_url: String::new(),
            background_removal_url: String::new(),
            api_key: None,
            timeout_secs: 60,
            rate_limit_per_minute: 60,
            max_image_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            finalize_delay_ms: 500,
            alpha_threshold: 20,
            session_ttl_secs: 3600,
            scales: ScaleTable::default(),
        }
    }
}
