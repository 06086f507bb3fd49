//! # cueboard-audio
//!
//! Playback coordination for Cueboard.
//!
//! Features:
//! - At most one trigger-driven playback session at a time
//! - Gain above unity through a lazily built processing graph
//! - Low-latency cpal output with symphonia decoding (`native` feature)

pub mod backend;
pub mod coordinator;
pub mod gain_path;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
#[cfg(feature = "native")]
pub mod native;

pub use backend::{
    AudioBackend, AudioResource, GainNode, ProcessingContext, ResourceEvent, ResourceId,
    SharedResource,
};
pub use coordinator::{
    CoordinatorEvent, Indicator, PlaybackCoordinator, PlaybackSession, SessionPhase,
    SourceResolver, StopReason, TriggerId,
};
pub use gain_path::{GainMode, GainOutcome, GainPathBuilder, GainStrategy};
