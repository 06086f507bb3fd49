//! # cueboard-core
//!
//! Core types, gain math, and error handling for the Cueboard soundboard.

pub mod control;
pub mod error;
pub mod gain;
pub mod notify;
pub mod settings;
pub mod source;

pub use control::{ControlConfig, PreviewKind, PreviewSpec};
pub use error::{Error, Result};
pub use gain::{PercentInput, DEFAULT_MAX_PERCENT, MAX_GAIN, UNITY_PERCENT};
pub use notify::{ChannelNotifier, HostNotifier, VolumeChanged};
pub use settings::{GainStrategyPreference, Settings};
pub use source::{LocalFile, ObjectUrl, SourceDescriptor};
