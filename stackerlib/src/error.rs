//! Error types for stackerlib

use thiserror::Error;

/// Errors that can occur while parsing stacker inputs.
///
/// Stacking itself never fails: targets that are not tables, or that carry no
/// bound instance, are skipped. Errors only come out of the explicit parsing
/// entry points (option JSON, CSS lengths, document input).
#[derive(Error, Debug)]
pub enum StackerError {
    /// A `maxWidth` value is not a CSS length we can evaluate
    #[error("invalid CSS length '{input}': {message}")]
    InvalidLength { input: String, message: String },

    /// Options JSON could not be decoded
    #[error("invalid stacker options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
