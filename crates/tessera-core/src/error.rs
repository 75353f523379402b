use thiserror::Error;

/// Error types shared by every Tessera crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TesseraError {
    /// The epoch has no recorded positive trust. Expected and recoverable:
    /// the local trust source answers it with the uniform fallback.
    #[error("no positive trust")]
    NoPositiveTrust,

    /// Trust storage access failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The network map for an epoch could not be retrieved.
    #[error("Network map error: {0}")]
    NetworkMap(String),

    /// The reporting sink rejected a record or failed to close.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Exact-ratio arithmetic failed (division by zero, overflow).
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// A trust record failed a validity check.
    #[error("Invalid trust: {0}")]
    InvalidTrust(String),

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed configuration value (keys, URLs, sizes).
    #[error("Config error: {0}")]
    Config(String),
}

impl TesseraError {
    /// Whether this is the recoverable "no positive trust" condition rather
    /// than a fault.
    pub fn is_no_positive_trust(&self) -> bool {
        matches!(self, TesseraError::NoPositiveTrust)
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(e: serde_json::Error) -> Self {
        TesseraError::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for TesseraError {
    fn from(e: hex::FromHexError) -> Self {
        TesseraError::Serialization(e.to_string())
    }
}
