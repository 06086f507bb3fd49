//! Process-wide runtime settings.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::gain::DEFAULT_MAX_PERCENT;
use crate::{Error, Result};

/// Environment variable pointing at an alternate settings file.
pub const SETTINGS_ENV: &str = "CUEBOARD_SETTINGS";

const SETTINGS_FILE: &str = "settings.json";

/// How gains above unity are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainStrategyPreference {
    /// Use a processing graph when the backend offers one.
    #[default]
    Auto,
    /// Never build a graph; cap at native volume.
    Native,
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Route prefix uploaded filenames are served beneath.
    pub uploads_route: String,
    /// Directory on disk backing `uploads_route`.
    pub uploads_dir: PathBuf,
    /// Quiet window before a volume change is committed.
    pub debounce_ms: u64,
    /// Slider range used when a control does not specify one.
    pub default_max_percent: u32,
    pub gain_strategy: GainStrategyPreference,
}

impl Default for Settings {
    fn default() -> Self {
        let uploads_dir = ProjectDirs::from("com", "cueboard", "Cueboard")
            .map_or_else(|| PathBuf::from("uploads"), |d| d.data_dir().join("uploads"));

        Self {
            uploads_route: "/uploads".to_string(),
            uploads_dir,
            debounce_ms: 100,
            default_max_percent: DEFAULT_MAX_PERCENT,
            gain_strategy: GainStrategyPreference::Auto,
        }
    }
}

impl Settings {
    /// Load settings from `$CUEBOARD_SETTINGS` or the platform config dir.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(SETTINGS_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        Self::load_from(&path)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn default_path() -> Result<PathBuf> {
        ProjectDirs::from("com", "cueboard", "Cueboard")
            .map(|d| d.config_dir().join(SETTINGS_FILE))
            .ok_or_else(|| Error::Internal("Failed to determine config directory".to_string()))
    }

    fn validate(&self) -> Result<()> {
        if !self.uploads_route.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "uploads_route must start with '/': {:?}",
                self.uploads_route
            )));
        }
        if self.default_max_percent == 0 {
            return Err(Error::InvalidConfig(
                "default_max_percent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.uploads_route, "/uploads");
        assert_eq!(settings.debounce(), Duration::from_millis(100));
        assert_eq!(settings.gain_strategy, GainStrategyPreference::Auto);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "debounce_ms": 250, "gain_strategy": "native" }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.gain_strategy, GainStrategyPreference::Native);
        assert_eq!(settings.default_max_percent, 150);
    }

    #[test]
    fn test_rejects_relative_route() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "uploads_route": "uploads" }"#).unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
