//! Error handling for Stemloop
//!
//! Load errors (fetch, decode) are deliberately unrecovered: they
//! propagate to the host with no retry and no partial-state cleanup.

use thiserror::Error;

/// Result type alias for Stemloop operations
pub type Result<T> = std::result::Result<T, StemloopError>;

/// Main error type for Stemloop operations
#[derive(Error, Debug)]
pub enum StemloopError {
    // Acquisition Errors
    #[error("Failed to fetch track '{name}' from {url}: {reason}")]
    FetchFailed {
        name: String,
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to decode track '{name}': {reason}")]
    DecodeFailed {
        name: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Lookup Errors
    #[error("Unknown track: '{name}' is not in the manifest")]
    UnknownTrack { name: String },

    #[error("Track '{name}' has not been loaded yet")]
    TrackNotLoaded { name: String },

    #[error("Model '{model_id}' is not bound to any track")]
    ModelNotBound { model_id: String },

    #[error("Invalid scene binding: {reason}")]
    BindingInvalid { reason: String },

    // Lifecycle Errors
    #[error("Playback has already been started for this session")]
    AlreadyStarted,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StemloopError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StemloopError::FetchFailed { .. } => "FETCH_FAILED",
            StemloopError::DecodeFailed { .. } => "DECODE_FAILED",
            StemloopError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            StemloopError::EmptyAudio => "EMPTY_AUDIO",
            StemloopError::UnknownTrack { .. } => "UNKNOWN_TRACK",
            StemloopError::TrackNotLoaded { .. } => "TRACK_NOT_LOADED",
            StemloopError::ModelNotBound { .. } => "MODEL_NOT_BOUND",
            StemloopError::BindingInvalid { .. } => "BINDING_INVALID",
            StemloopError::AlreadyStarted => "ALREADY_STARTED",
            StemloopError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error was raised during asset acquisition
    ///
    /// Acquisition errors abort the start attempt that triggered them;
    /// lookup and lifecycle errors leave the session untouched.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            StemloopError::FetchFailed { .. }
                | StemloopError::DecodeFailed { .. }
                | StemloopError::UnsupportedFormat { .. }
                | StemloopError::EmptyAudio
        )
    }
}
