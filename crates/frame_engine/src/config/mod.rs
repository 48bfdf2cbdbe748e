//! Configuration system

mod settings;

pub use serde::{Deserialize, Serialize};
pub use settings::{EngineConfig, RendererConfig, ShaderConfig, WindowConfig};

use std::path::Path;

/// Configuration trait
///
/// The file extension picks the format: `.toml` or `.ron`.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load configuration, falling back to defaults if the file is missing
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("frame_engine_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_toml_roundtrip() {
        let path = temp_path("engine.toml");
        let config = EngineConfig::default().with_log_level("debug");
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.renderer.vertex_capacity, 1000);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_ron_roundtrip() {
        let path = temp_path("engine.ron");
        let mut config = EngineConfig::default();
        config.renderer = config.renderer.with_clear_color([0.1, 0.2, 0.3, 1.0]);
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.renderer.clear_color, [0.1, 0.2, 0.3, 1.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EngineConfig::default().save_to_file(temp_path("engine.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let loaded = EngineConfig::load_or_default(temp_path("missing.toml")).unwrap();
        assert_eq!(loaded.window.width, 800);
    }

    /// Partial files fill the rest from defaults
    #[test]
    fn test_partial_toml() {
        let path = temp_path("partial.toml");
        std::fs::write(&path, "log_level = \"warn\"\n[window]\ntitle = \"Partial\"\n").unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.log_level, "warn");
        assert_eq!(loaded.window.title, "Partial");
        assert_eq!(loaded.window.height, 600);
        assert_eq!(loaded.renderer.max_frames_in_flight, 2);
        std::fs::remove_file(&path).ok();
    }
}
