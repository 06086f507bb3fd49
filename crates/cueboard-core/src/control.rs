//! Per-control configuration handed over by the host page.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};

use crate::gain::{PercentInput, DEFAULT_MAX_PERCENT};
use crate::source::SourceDescriptor;
use crate::{Error, Result};

/// Event name used when the host does not supply one.
pub const DEFAULT_EVENT: &str = "volume_changed";

/// Default slider thumb diameter in pixels.
pub const DEFAULT_THUMB_SIZE: u32 = 16;

/// What a control previews when its preview button is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewSpec {
    /// A file the user is about to upload; chosen via the file picker.
    LocalFile,
    /// A URL typed into a form field, possibly still incomplete.
    EnteredUrl { url: String },
    /// The sound already stored for this control.
    Existing { source: SourceDescriptor },
}

/// Discriminant of [`PreviewSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewKind {
    LocalFile,
    EnteredUrl,
    Existing,
}

impl PreviewSpec {
    pub const fn kind(&self) -> PreviewKind {
        match self {
            Self::LocalFile => PreviewKind::LocalFile,
            Self::EnteredUrl { .. } => PreviewKind::EnteredUrl,
            Self::Existing { .. } => PreviewKind::Existing,
        }
    }
}

/// Configuration of one volume control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Preview source, if this control can audition sounds.
    #[serde(default)]
    pub preview: Option<PreviewSpec>,
    /// Current percent as rendered by the host.
    #[serde(default)]
    pub percent: PercentInput,
    /// Upper bound of the slider.
    #[serde(default = "default_max_percent")]
    pub max_percent: u32,
    /// Name of the event pushed to the host on commit.
    #[serde(default = "default_event")]
    pub event: String,
    /// Optional component the event is addressed to.
    #[serde(default)]
    pub target: Option<String>,
    /// Slider thumb diameter in pixels.
    #[serde(default = "default_thumb_size")]
    pub thumb_size: u32,
}

const fn default_max_percent() -> u32 {
    DEFAULT_MAX_PERCENT
}

fn default_event() -> String {
    DEFAULT_EVENT.to_string()
}

const fn default_thumb_size() -> u32 {
    DEFAULT_THUMB_SIZE
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            preview: None,
            percent: PercentInput::default(),
            max_percent: DEFAULT_MAX_PERCENT,
            event: default_event(),
            target: None,
            thumb_size: DEFAULT_THUMB_SIZE,
        }
    }
}

impl ControlConfig {
    pub fn new(max_percent: u32) -> Self {
        Self {
            max_percent,
            ..Self::default()
        }
    }

    pub fn with_preview(mut self, preview: PreviewSpec) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_percent(mut self, percent: impl Into<PercentInput>) -> Self {
        self.percent = percent.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    /// Parse a configuration from the JSON a host renders.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no control can work with.
    ///
    /// Entered URLs are not checked here; the user may still be typing.
    pub fn validate(&self) -> Result<()> {
        if self.max_percent == 0 {
            return Err(Error::InvalidConfig("max_percent must be at least 1".into()));
        }
        if self.event.trim().is_empty() {
            return Err(Error::InvalidConfig("event name must not be empty".into()));
        }
        if let Some(PreviewSpec::Existing { source }) = &self.preview {
            source.validate()?;
        }
        Ok(())
    }

    pub fn preview_kind(&self) -> Option<PreviewKind> {
        self.preview.as_ref().map(PreviewSpec::kind)
    }
}
