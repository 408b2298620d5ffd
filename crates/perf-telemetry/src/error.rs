use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Capability not supported: {0}")]
    Unsupported(String),

    #[error("Host call failed: {0}")]
    Host(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl TelemetryError {
    /// Shorthand for a missing host capability
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported(capability.into())
    }

    /// Whether this error only means the host lacks a capability
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
