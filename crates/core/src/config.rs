use std::fs;
use std::path::{Path, PathBuf};

use prism_lights::Rgb;
use serde::{Deserialize, Serialize};

use crate::color::ColorMode;

/// Runtime settings consumed by the engine.
///
/// Timing values are milliseconds to keep the config file human-editable;
/// the engine converts to `Duration` at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Delay between remote playback polls.
    pub poll_interval_ms: u64,
    /// Local/remote divergence beyond which the clock is re-anchored.
    pub drift_threshold_ms: u64,
    /// Spacing between individual actuator commands during a ramp.
    pub command_delay_ms: u64,
    /// Color ramp interpolation mode.
    pub color_mode: ColorMode,
    /// Palette endpoint for low pitch-band energy (`#rrggbb`).
    pub palette_low: String,
    /// Palette endpoint for high pitch-band energy (`#rrggbb`).
    pub palette_high: String,
    /// Number of console-backed demo lights the binary creates.
    pub light_count: usize,
    /// Music service bearer token. Falls back to the `PRISM_API_TOKEN`
    /// environment variable when unset.
    pub api_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            poll_interval_ms: 1000,
            drift_threshold_ms: 100,
            command_delay_ms: 50,
            color_mode: ColorMode::default(),
            palette_low: "#16228d".to_string(),
            palette_high: "#e4572e".to_string(),
            light_count: 2,
            api_token: None,
        }
    }
}

impl Settings {
    /// Palette endpoints as colors. Call after validation.
    pub fn palette(&self) -> (Rgb, Rgb) {
        let low = Rgb::from_hex(&self.palette_low).unwrap_or(Rgb::new(22, 34, 141));
        let high = Rgb::from_hex(&self.palette_high).unwrap_or(Rgb::new(228, 87, 46));
        (low, high)
    }
}

/// Persisted configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

/// Configuration manager for Prism settings.
/// Stores settings as JSON at the given path (default `config.json` in the
/// working directory) and writes a default file on first run.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, creating it with defaults
    /// if it doesn't exist.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "config file version {} doesn't match application version {}, using defaults for new settings",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Validate settings ranges.
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(250..=10_000).contains(&settings.poll_interval_ms) {
            errors.push("poll_interval_ms must be between 250 and 10000".to_string());
        }
        if !(20..=2_000).contains(&settings.drift_threshold_ms) {
            errors.push("drift_threshold_ms must be between 20 and 2000".to_string());
        }
        if !(10..=500).contains(&settings.command_delay_ms) {
            errors.push("command_delay_ms must be between 10 and 500".to_string());
        }
        if !(1..=12).contains(&settings.light_count) {
            errors.push("light_count must be between 1 and 12".to_string());
        }
        if Rgb::from_hex(&settings.palette_low).is_none() {
            errors.push(format!(
                "palette_low '{}' is not a #rrggbb color",
                settings.palette_low
            ));
        }
        if Rgb::from_hex(&settings.palette_high).is_none() {
            errors.push(format!(
                "palette_high '{}' is not a #rrggbb color",
                settings.palette_high
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults and persist them.
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to write config file: {0}")]
    Write(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}
