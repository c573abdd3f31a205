//! Error types for vidrec_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised by configuration records and clip batches.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A key required by the requested operation is absent from a config record.
    #[error("\"{key}\" must be defined in {record}'s keys")]
    MissingConfigKey {
        /// Name of the missing key.
        key: String,
        /// Name of the config record (e.g. `test_cfg`).
        record: String,
    },

    /// The `average_clips` policy holds a value outside of the supported set.
    #[error("{0} is not supported. Currently supported ones are [\"score\", \"prob\", None]")]
    UnsupportedAverageClips(String),

    /// A config value has the wrong type or an invalid value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensors in a batch disagree on their batch dimension.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build a [`CoreError::MissingConfigKey`] error.
    pub fn missing_key(key: impl Into<String>, record: impl Into<String>) -> Self {
        Self::MissingConfigKey {
            key: key.into(),
            record: record.into(),
        }
    }
}
