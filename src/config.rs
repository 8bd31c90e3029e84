use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Voice parameters passed to the speech collaborator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpeechOptions {
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            rate: 1.0,
            volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub voice_enabled: bool,
    pub speech: SpeechOptions,
    /// External TTS program; `None` keeps speech silent
    pub speech_command: Option<String>,
    pub prepare_seconds: u32,
    pub default_rounds: u32,
    pub default_round_seconds: u32,
    pub default_rest_seconds: u32,
    pub gym_rest_seconds: u32,
    /// Tick loop plays during this many final seconds of a work segment
    pub tick_warning_seconds: u32,
    pub auto_pause: bool,
    pub body_weight_kg: f64,
    pub persist_interval_seconds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voice_enabled: true,
            speech: SpeechOptions::default(),
            speech_command: Some("espeak".to_string()),
            prepare_seconds: 10,
            default_rounds: 3,
            default_round_seconds: 180,
            default_rest_seconds: 60,
            gym_rest_seconds: 60,
            tick_warning_seconds: 10,
            auto_pause: true,
            body_weight_kg: 70.0,
            persist_interval_seconds: 10,
        }
    }
}

impl Config {
    /// Swap zero durations for the built-in defaults. A zero-length timed
    /// segment would never expire.
    pub fn sanitized(mut self) -> Self {
        let defaults = Config::default();
        for (name, value, fallback) in [
            ("default_rounds", &mut self.default_rounds, defaults.default_rounds),
            (
                "default_round_seconds",
                &mut self.default_round_seconds,
                defaults.default_round_seconds,
            ),
            (
                "default_rest_seconds",
                &mut self.default_rest_seconds,
                defaults.default_rest_seconds,
            ),
            ("gym_rest_seconds", &mut self.gym_rest_seconds, defaults.gym_rest_seconds),
        ] {
            if *value == 0 {
                tracing::warn!(setting = name, fallback, "zero is not a usable value, using default");
                *value = fallback;
            }
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("bellwork_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg.sanitized(),
                Err(e) => {
                    tracing::warn!(path = ?self.path, error = %e, "ignoring unreadable config")
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            voice_enabled: false,
            speech: SpeechOptions {
                pitch: 0.8,
                rate: 1.2,
                volume: 0.5,
            },
            speech_command: None,
            prepare_seconds: 5,
            default_rounds: 12,
            default_round_seconds: 120,
            default_rest_seconds: 30,
            gym_rest_seconds: 90,
            tick_warning_seconds: 5,
            auto_pause: false,
            body_weight_kg: 82.5,
            persist_interval_seconds: 5,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_remaining_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"prepare_seconds": 3}"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.prepare_seconds, 3);
        assert_eq!(cfg.default_round_seconds, 180);
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"default_round_seconds": 0, "gym_rest_seconds": 0, "prepare_seconds": 0}"#,
        )
        .unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.default_round_seconds, 180);
        assert_eq!(cfg.gym_rest_seconds, 60);
        // no preparation is a valid choice
        assert_eq!(cfg.prepare_seconds, 0);
    }
}
