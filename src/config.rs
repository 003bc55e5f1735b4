use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for Frame-Scout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame scanning settings
    pub scan: ScanConfig,

    /// Marker generation settings
    pub marker: MarkerConfig,

    /// External tool locations
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed {
                path: path.display().to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        self.marker.validate()?;
        Ok(())
    }
}

/// Frame scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum mean normalized pixel difference for a match (0.0-1.0)
    pub threshold: f64,

    /// Emit progress every this many frames
    pub progress_interval: u64,

    /// Worker threads used for comparing a frame against the targets
    pub threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: crate::matching::DEFAULT_THRESHOLD,
            progress_interval: 10,
            threads: num_cpus::get(),
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidValue {
                key: "scan.threshold".to_string(),
                value: self.threshold.to_string(),
            }
            .into());
        }

        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scan.progress_interval".to_string(),
                value: self.progress_interval.to_string(),
            }
            .into());
        }

        if self.threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scan.threads".to_string(),
                value: self.threads.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Marker generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Frequency of the marker tone (Hz)
    pub tone_frequency: f64,

    /// Length of each marker tone (seconds)
    pub tone_duration: f64,

    /// Sample rate of the marker audio track (Hz)
    pub sample_rate: u32,

    /// Directory for temporary artifacts. Defaults to the output's directory.
    pub work_dir: Option<PathBuf>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            tone_frequency: 1000.0,
            tone_duration: 0.1,
            sample_rate: 44100,
            work_dir: None,
        }
    }
}

impl MarkerConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "marker.sample_rate".to_string(),
                value: self.sample_rate.to_string(),
            }
            .into());
        }

        if self.tone_duration <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "marker.tone_duration".to_string(),
                value: self.tone_duration.to_string(),
            }
            .into());
        }

        if self.tone_frequency <= 0.0 || self.tone_frequency >= self.sample_rate as f64 / 2.0 {
            return Err(ConfigError::InvalidValue {
                key: "marker.tone_frequency".to_string(),
                value: self.tone_frequency.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Paths to the external FFmpeg tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("frame_scout.toml");

        let mut original_config = Config::default();
        original_config.scan.threshold = 0.1;
        original_config.marker.work_dir = Some(dir.path().to_path_buf());

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.scan.threshold, 0.1);
        assert_eq!(loaded_config.marker.sample_rate, 44100);
        assert_eq!(loaded_config.marker.work_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[scan]\nthreshold = 0.02\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.scan.threshold, 0.02);
        assert_eq!(config.scan.progress_interval, 10);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = Config::default();
        config.scan.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tone_above_nyquist_is_rejected() {
        let mut config = Config::default();
        config.marker.sample_rate = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::ScoutError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
