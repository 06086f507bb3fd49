//! Error types for Cueboard.

use thiserror::Error;

/// Result type alias using Cueboard's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cueboard.
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("No playable source: {0}")]
    Resolution(String),

    #[error("Invalid control configuration: {0}")]
    InvalidConfig(String),

    // Playback errors
    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // Processing graph errors
    #[error("Processing graph unavailable: {0}")]
    Graph(String),

    #[error("Resource {0} is already routed through a processing graph")]
    AlreadyRouted(u64),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if no usable source was available.
    ///
    /// Callers treat these as silent no-ops rather than failures.
    pub const fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    /// Returns true if a newer request superseded this one.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the failure came from building a processing graph.
    pub const fn is_graph(&self) -> bool {
        matches!(self, Self::Graph(_) | Self::AlreadyRouted(_))
    }
}
