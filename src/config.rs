use crate::baseline::BaselineConfig;
use crate::error::{HrvError, Result};
use crate::models::REFERENCE_TIMEZONE;
use crate::stages::{StageClassifierConfig, StageThresholds};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// General analysis settings
    pub settings: AnalysisSettings,

    /// Baseline calculation settings
    pub baseline: BaselineSettings,

    /// Sleep stage classification thresholds
    pub stages: StageThresholds,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Directory scanned for importable record files
    pub data_dir: PathBuf,

    /// IANA timezone name used for calendar-date bucketing
    pub timezone: String,
}

/// Baseline calculation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSettings {
    /// Trailing window length in days for the static baseline
    pub window_days: u32,

    /// Fraction of lowest values the dynamic RHR/HRV baselines draw from
    pub lowest_fraction: f64,

    /// Minimum cumulative sleep records before lowest-fraction baselines apply
    pub min_sleep_samples: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AnalysisSettings::default(),
            baseline: BaselineSettings::default(),
            stages: StageThresholds::default(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            data_dir: PathBuf::from("./data"),
            timezone: REFERENCE_TIMEZONE.name().to_string(),
        }
    }
}

impl Default for BaselineSettings {
    fn default() -> Self {
        let reference = BaselineConfig::default();
        BaselineSettings {
            window_days: reference.window_days,
            lowest_fraction: reference.lowest_fraction,
            min_sleep_samples: reference.min_sleep_samples,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            HrvError::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| HrvError::Configuration(format!("Failed to parse TOML configuration: {e}")))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        // Update modification timestamp
        self.metadata.updated_at = Utc::now();

        // Create directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| {
                HrvError::Configuration(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let toml_content = toml::to_string_pretty(self).map_err(|e| {
            HrvError::Configuration(format!("Failed to serialize configuration to TOML: {e}"))
        })?;

        fs::write(&path, toml_content).map_err(|e| {
            HrvError::Configuration(format!(
                "Failed to write config file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hrvrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }

    /// Save configuration (alias for save_default)
    pub fn save(&mut self) -> Result<()> {
        self.save_default()
    }

    /// Parse the configured timezone name
    pub fn reference_timezone(&self) -> Result<Tz> {
        self.settings.timezone.parse::<Tz>().map_err(|_| {
            HrvError::Configuration(format!("Unknown timezone: {}", self.settings.timezone))
        })
    }

    /// Assemble a baseline calculator configuration
    pub fn baseline_config(&self) -> Result<BaselineConfig> {
        Ok(BaselineConfig {
            tz: self.reference_timezone()?,
            window_days: self.baseline.window_days,
            lowest_fraction: self.baseline.lowest_fraction,
            min_sleep_samples: self.baseline.min_sleep_samples,
        })
    }

    /// Assemble a stage classifier configuration
    pub fn stage_config(&self) -> Result<StageClassifierConfig> {
        Ok(StageClassifierConfig {
            thresholds: self.stages.clone(),
            tz: self.reference_timezone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.settings.timezone, deserialized.settings.timezone);
        assert_eq!(config.baseline.window_days, deserialized.baseline.window_days);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = AppConfig::default();
        original.baseline.window_days = 21;
        original.stages.rem_lf_hf_min = 2.5;

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.baseline.window_days, 21);
        assert_eq!(loaded.stages.rem_lf_hf_min, 2.5);
        assert_eq!(loaded.settings.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_timezone_parsing() {
        let config = AppConfig::default();
        assert_eq!(config.reference_timezone().unwrap(), chrono_tz::Europe::Berlin);

        let mut broken = AppConfig::default();
        broken.settings.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(
            broken.reference_timezone(),
            Err(HrvError::Configuration(_))
        ));
    }

    #[test]
    fn test_baseline_config_assembly() {
        let mut config = AppConfig::default();
        config.baseline.lowest_fraction = 0.25;

        let assembled = config.baseline_config().unwrap();
        assert_eq!(assembled.lowest_fraction, 0.25);
        assert_eq!(assembled.tz, chrono_tz::Europe::Berlin);
        assert_eq!(assembled.window_days, 14);
    }

    #[test]
    fn test_missing_file_falls_back_to_error() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(HrvError::Configuration(_))));
    }
}
