//! Host configuration.
//!
//! Wraps the engine's [`AudioConfig`] with session settings. Loaded from
//! `volley.toml`; a missing or broken file falls back to defaults.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use volley_audio::AudioConfig;

/// Configuration file name.
const CONFIG_FILE: &str = "volley.toml";

/// Where audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Simulated devices, no sound.
    #[default]
    Headless,
    /// The default system device (needs the `rodio-output` feature).
    Rodio,
}

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Session ===
    /// Engine ticks per second
    pub tick_rate: u32,
    /// Length of the scripted session in seconds
    pub session_seconds: f32,
    /// Pace ticks against the wall clock instead of running flat out
    pub realtime: bool,

    // === Assets ===
    /// Catalog manifest (TOML). None = built-in demo catalog
    pub manifest: Option<PathBuf>,
    /// Root directory clip paths are relative to
    pub asset_root: PathBuf,
    /// Preload every catalog clip at startup
    pub preload: bool,

    // === Output ===
    /// Output backend
    pub output: OutputKind,

    /// Engine settings
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            session_seconds: 5.0,
            realtime: false,
            manifest: None,
            asset_root: PathBuf::from("assets/audio"),
            preload: true,
            output: OutputKind::Headless,
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location, writing the
    /// defaults there on first run.
    pub fn load_or_init() -> Self {
        Self::load_or_init_at(Self::config_path())
    }

    /// Load configuration from `path`, writing the defaults there if the
    /// file doesn't exist yet.
    pub fn load_or_init_at<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            warn!("Failed to write default config to {}: {e}", path.display());
        }
        config
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Default configuration file path.
    fn config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("volley").join(CONFIG_FILE),
            None => PathBuf::from(CONFIG_FILE),
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(10, 1000);
        self.session_seconds = self.session_seconds.clamp(0.0, 3600.0);
        self.audio.validate();
    }

    /// Seconds per tick.
    #[must_use]
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use volley_common::AudioCategory;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.output, OutputKind::Headless);
        assert!(config.manifest.is_none());
        assert_eq!(config.audio.initial_pool_size, 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig {
            tick_rate: 1,
            session_seconds: -4.0,
            ..EngineConfig::default()
        };
        config.audio.master_volume = 7.0;
        config.validate();

        assert_eq!(config.tick_rate, 10);
        assert!(config.session_seconds.abs() < f32::EPSILON);
        assert!((config.audio.master_volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_save_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = EngineConfig {
            tick_rate: 120,
            manifest: Some(PathBuf::from("sounds.toml")),
            output: OutputKind::Rodio,
            ..EngineConfig::default()
        };
        config.audio.initial_pool_size = 16;
        config.save_to(&path).expect("save");

        let loaded = EngineConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("volley").join(CONFIG_FILE);

        let config = EngineConfig::load_or_init_at(&path);
        assert_eq!(config, EngineConfig::default());
        assert!(path.exists());

        fs::write(&path, "tick_rate = 30").expect("write");
        assert_eq!(EngineConfig::load_or_init_at(&path).tick_rate, 30);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/volley.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "tick_rate = \"fast\"").expect("write");
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
    }

    #[test]
    fn test_config_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            output = "rodio"
            [audio]
            initial_pool_size = 2
            [audio.categories.music]
            bus = "music"
            volume_parameter = "music_volume"
            default_volume = 0.3
            "#,
        )
        .expect("parse");

        assert_eq!(config.output, OutputKind::Rodio);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.audio.initial_pool_size, 2);
        assert_eq!(config.audio.categories.len(), 1);
        assert!(config.audio.categories.contains_key(&AudioCategory::Music));
    }
}
