//! Board description loaded at startup.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::Path;

use anyhow::{Context, Result};
use cueboard_core::{SourceDescriptor, UNITY_PERCENT};
use serde::{Deserialize, Serialize};

/// One sound on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEntry {
    pub id: String,
    pub name: String,
    pub source: SourceDescriptor,
    /// Playback percent, `0..=max_percent`.
    #[serde(default = "default_volume")]
    pub volume: u32,
}

const fn default_volume() -> u32 {
    UNITY_PERCENT
}

/// The sounds shown on the board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sounds: Vec<SoundEntry>,
}

impl Board {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading board {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing board {}", path.display()))
    }

    /// Board used when no file is given: whatever sits in the uploads route.
    pub fn sample() -> Self {
        let upload = |id: &str, name: &str, file: &str| SoundEntry {
            id: id.to_string(),
            name: name.to_string(),
            source: SourceDescriptor::Upload(file.to_string()),
            volume: UNITY_PERCENT,
        };
        Self {
            title: None,
            sounds: vec![
                upload("airhorn", "Air horn", "airhorn.mp3"),
                upload("rimshot", "Rimshot", "rimshot.wav"),
                upload("applause", "Applause", "applause.ogg"),
            ],
        }
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Cueboard")
    }
}
