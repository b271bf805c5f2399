//! Error types for vistext.

use thiserror::Error;

/// Result type alias for vistext operations.
pub type Result<T> = std::result::Result<T, VisTextError>;

/// Main error type for vistext operations.
///
/// Collaborator failures (tokenizer, image decoder, pixel transforms)
/// propagate unchanged into their variant; the pipeline performs no
/// retries and no silent fallback. A malformed sample fails that sample,
/// it never corrupts a batch.
#[derive(Error, Debug)]
pub enum VisTextError {
    /// Configuration errors, rejected at pipeline-build time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tokenizer errors.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Image decode or pixel-transform errors.
    #[error("Transform error: {0}")]
    Transform(String),

    /// Tensor shape mismatch inside one batch.
    ///
    /// Always a programming or scheduling defect, never recovered locally.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Scale-schedule errors (empty schedule, non-dividing resolution factor).
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
