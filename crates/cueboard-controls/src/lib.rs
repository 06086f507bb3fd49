//! # cueboard-controls
//!
//! UI-facing controls of the Cueboard soundboard: trigger buttons sharing
//! one [`PlaybackCoordinator`](cueboard_audio::PlaybackCoordinator), and
//! volume sliders that preview sounds at the chosen gain.

pub mod debounce;
pub mod preview;
pub mod trigger;
pub mod volume;

pub use debounce::Debouncer;
pub use preview::{FileSelection, PreviewSlot, PreviewState};
pub use trigger::TriggerControl;
pub use volume::{VolumeControl, VolumeDisplay};
