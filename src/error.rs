use thiserror::Error;

use crate::types::Step;

/// Errors returned by asset encoding and generation operations.
#[derive(Error, Debug)]
pub enum TryOnError {
    /// A remote asset could not be retrieved (network, CORS-style rejection,
    /// non-success status, timeout).
    #[error("Failed to fetch image from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A payload could not be normalized into an inline image.
    #[error("Could not decode image: {0}")]
    Decode(String),

    /// The garment prompt was blank.
    #[error("Garment description is empty")]
    EmptyPrompt,

    /// The model answered without any image part.
    #[error("No image returned by the model: {0}")]
    NoImageReturned(String),

    /// The generation API returned a non-success HTTP status.
    #[error("Generation API returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration (API key, endpoint).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A wizard transition was rejected.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TryOnError {
    /// True for transport and API-level failures of the generation service.
    pub fn is_remote(&self) -> bool {
        matches!(self, TryOnError::Remote { .. } | TryOnError::Network { .. })
    }
}

/// Rejected wizard transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("'{action}' is not allowed in step {current:?}")]
    WrongStep { action: &'static str, current: Step },

    #[error("No person selected")]
    PersonNotSelected,

    #[error("No garment selected")]
    GarmentNotSelected,

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("Unknown history entry '{0}'")]
    UnknownHistoryEntry(String),

    #[error("No result available")]
    NoResult,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TryOnError>;
