//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of the live context when the output device does not
    /// impose one.
    pub sample_rate: u32,

    /// Synthetic reverb impulse shared by every track's convolver
    pub impulse: ImpulseConfig,

    /// Maximum number of snapshots kept by the undo history
    pub history_depth: usize,

    /// Level meter analysis settings
    pub analyser: AnalyserConfig,

    /// Offline bounce settings
    pub export: ExportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            impulse: ImpulseConfig::default(),
            history_depth: 100,
            analyser: AnalyserConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Synthetic impulse response parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Length of the impulse in seconds
    pub duration_secs: f32,
    /// Exponent of the amplitude envelope `((len - i) / len)^decay`
    pub decay: f32,
    /// Fixed noise seed. `None` draws from the thread RNG, so two sessions
    /// get different (but equally valid) impulses.
    pub seed: Option<u64>,
    /// Apply the equal-power normalisation convolvers use by default
    pub normalize: bool,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            duration_secs: 2.0,
            decay: 2.0,
            seed: None,
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    /// Time constant of the spectrum smoothing, 0.0 to 1.0
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Offline bounce configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub sample_rate: u32,
    /// Render each track through its full EQ/delay/reverb chain. When
    /// false only pan and gain are applied.
    pub include_effects: bool,
    /// Route the bounce through master EQ, compressor and limiter. When
    /// false only the master volume is applied.
    pub include_master_chain: bool,
    /// Appended to the session title to form the download file name
    pub filename_suffix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            include_effects: true,
            include_master_chain: true,
            filename_suffix: "_mixed.wav".to_string(),
        }
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = serde_json::from_str(&contents)?;
    log::info!("load_config: loaded {:?}", path);
    Ok(config)
}

/// Load configuration, falling back to defaults if the file is missing or invalid
pub fn load_config_or_default(path: &Path) -> EngineConfig {
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return EngineConfig::default();
    }

    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("load_config: {}, using defaults", e);
            EngineConfig::default()
        }
    }
}

/// Save configuration as pretty-printed JSON
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(path, contents).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "history_depth": 10, "export": { "include_effects": false } }"#).unwrap();
        assert_eq!(config.history_depth, 10);
        assert!(!config.export.include_effects);
        assert!(config.export.include_master_chain);
        assert_eq!(config.export.filename_suffix, "_mixed.wav");
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.impulse.duration_secs, 2.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let mut config = EngineConfig::default();
        config.impulse.seed = Some(7);
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).is_err());
        assert_eq!(load_config_or_default(&path), EngineConfig::default());
        assert_eq!(load_config_or_default(&dir.path().join("missing.json")), EngineConfig::default());
    }
}
