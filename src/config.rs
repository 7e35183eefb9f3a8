use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Engine-level configuration for versecut.
///
/// This covers the runtime knobs (canvas, workers, export staging) that are
/// not part of any one project; per-project render settings travel inside
/// the project document instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Compositing settings
    pub render: RenderConfig,

    /// Export/mux settings
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string(),
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        self.export.validate()?;
        Ok(())
    }
}

/// Compositing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Output canvas resolution (width, height)
    pub canvas: (u32, u32),

    /// Number of parallel frame workers
    pub worker_threads: usize,

    /// Gray level used for placeholder frames when a source frame is missing
    pub placeholder_luma: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas: (1920, 1080),
            worker_threads: num_cpus::get(),
            placeholder_luma: 64,
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> Result<()> {
        if self.canvas.0 == 0 || self.canvas.1 == 0 {
            return Err(ConfigError::InvalidValue {
                key: "render.canvas".to_string(),
                value: format!("{}x{}", self.canvas.0, self.canvas.1),
            }
            .into());
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "render.worker_threads".to_string(),
                value: self.worker_threads.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Container codec handed to the encode collaborator
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Keep the staging directory after a successful export
    pub keep_temp: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            codec: "h264".to_string(),
            quality: 85,
            keep_temp: false,
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "export.quality".to_string(),
                value: self.quality.to_string(),
            }
            .into());
        }
        Ok(())
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
        let file_path = dir.path().join("test_config.toml");

        let original_config = Config::default();

        // Save and load
        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.render.canvas, loaded_config.render.canvas);
        assert_eq!(original_config.export.codec, loaded_config.export.codec);
    }

    #[test]
    fn test_invalid_canvas() {
        let mut config = Config::default();
        config.render.canvas = (0, 1080);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_worker_count() {
        let mut config = Config::default();
        config.render.worker_threads = 0;
        assert!(config.validate().is_err());
    }
}
