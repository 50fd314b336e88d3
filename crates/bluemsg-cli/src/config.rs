//! BlueMsg CLI Configuration Management
//!
//! Configuration is layered, later layers winning:
//! - built-in defaults
//! - `bluemsg.toml` in the working directory
//! - `~/.bluemsg/config.toml`
//! - `BLUEMSG_*` environment variables (`__` separates sections, e.g.
//!   `BLUEMSG_RADIO__BACKEND=bluez`)
//! - command line flags, applied by the caller

use std::path::{Path, PathBuf};

use bluemsg_core::BluemsgConfig;
use bluemsg_radio::{LanRadioConfig, RadioBackend, RadioConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Project configuration file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "bluemsg.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "BLUEMSG_";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the BlueMsg CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliAppConfig {
    /// Coordinator timing and channel sizes
    pub core: BluemsgConfig,
    /// Radio backend and its settings
    pub radio: RadioConfig,
    /// Terminal behaviour
    pub cli: CliConfig,
}

/// Terminal behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Prompt printed before each input line
    pub prompt: String,
    /// Start listening as soon as the radio checks pass
    pub listen_on_startup: bool,
    /// Prefix messages with their local time
    pub show_timestamps: bool,
    /// Print app events as JSON lines
    pub json_output: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "bluemsg> ".to_string(),
            listen_on_startup: true,
            show_timestamps: true,
            json_output: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliAppConfig {
    /// Load defaults, the standard config files and environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE));
        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load defaults, one explicit file and environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Loading(format!("{} does not exist", path.display())));
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: CliAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.bluemsg/config.toml`, when a home directory is known
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".bluemsg").join("config.toml"))
    }

    /// Apply command line flags on top of the loaded configuration
    pub fn apply_overrides(&mut self, backend: Option<RadioBackend>, name: Option<String>, json: bool) {
        if let Some(backend) = backend {
            self.radio.backend = backend;
        }
        if let Some(name) = name {
            self.radio.lan.device_name = Some(name);
        }
        if json {
            self.cli.json_output = true;
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.radio.validate().map_err(ConfigError::Validation)?;
        if self.cli.prompt.is_empty() {
            return Err(ConfigError::Validation("Prompt must not be empty".to_string()));
        }
        Ok(())
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let example = CliAppConfig {
            radio: RadioConfig::new().with_lan(LanRadioConfig::new().with_device_name("my-laptop")),
            ..Default::default()
        };
        toml::to_string_pretty(&example).unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
