//! Error types for recognizers.

use thiserror::Error;

use crate::registry::RegistryError;

/// Result type alias for recognizer operations.
pub type Result<T> = std::result::Result<T, RecognizerError>;

/// Errors raised by the recognizer contract.
#[derive(Error, Debug)]
pub enum RecognizerError {
    /// A loss was requested without labels.
    #[error("Label should not be None.")]
    MissingLabel,

    /// No recognizer variant with this name.
    #[error("Recognizer '{0}' is not supported. Available: {1:?}")]
    UnknownRecognizer(String, &'static [&'static str]),

    /// A variant returned the wrong kind of forward output.
    #[error("Forward pass returned {got}, expected {expected}")]
    UnexpectedOutput {
        /// Expected output kind.
        expected: &'static str,
        /// Returned output kind.
        got: &'static str,
    },

    /// Configuration or batch error.
    #[error(transparent)]
    Core(#[from] vidrec_core::CoreError),

    /// Backbone/head could not be built.
    #[error("Failed to build component: {0}")]
    Registry(#[from] RegistryError),
}
