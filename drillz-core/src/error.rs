//! Error types for the DRILLZ core library.

use thiserror::Error;

/// Top-level error type for all DRILLZ operations.
#[derive(Error, Debug)]
pub enum DrillzError {
    /// Malformed arguments (negative or non-finite latency, bad samples).
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// `select_next` was called with no enabled items.
    #[error("Cannot select from an empty item pool")]
    EmptyPool,

    /// The calibration probe produced too few usable samples.
    #[error("Insufficient calibration samples: {got} usable (need at least {needed})")]
    InsufficientSamples {
        /// Samples left after discarding the warm-up.
        got: usize,
        /// Minimum usable samples required.
        needed: usize,
    },

    /// A scheduler configuration failed validation.
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DrillzError {
    /// Shorthand for [`DrillzError::InvalidInput`].
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, DrillzError>;
