//! Error handling for the scrypt-jane mining core
//!
//! Fatal conditions (cost exponent over the hard ceiling, unusable device)
//! surface as `Err` values; the caller decides whether to terminate. Local
//! conditions (profile parse fallback, failed candidate re-verification) are
//! handled in place with a logged diagnostic and never reach this type.

use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining core
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (worker thread spawn, host plumbing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mining work errors
    #[error("Work error: {message}")]
    Work { message: String },

    /// Target validation errors
    #[error("Invalid target: {message}")]
    Target { message: String },

    /// Cost exponent (N-factor) out of range
    #[error("N-factor error: {message}")]
    Nfactor { message: String },

    /// Mixing device errors
    #[error("Device error: {message}")]
    Device { message: String },

    /// Invalid state errors
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl Error {
    /// Create a work error
    pub fn work(message: impl Into<String>) -> Self {
        Self::Work {
            message: message.into(),
        }
    }

    /// Create a target error
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            message: message.into(),
        }
    }

    /// Create an N-factor error
    pub fn nfactor(message: impl Into<String>) -> Self {
        Self::Nfactor {
            message: message.into(),
        }
    }

    /// Create a device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// True for conditions that must not be retried with the same inputs
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Nfactor { .. } | Error::Device { .. })
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Work { .. } => "work",
            Error::Target { .. } => "target",
            Error::Nfactor { .. } => "nfactor",
            Error::Device { .. } => "device",
            Error::InvalidState { .. } => "invalid_state",
        }
    }
}
