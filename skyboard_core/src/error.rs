//! Error types for the Skyboard control kernel.

use thiserror::Error;

/// Errors raised while loading or validating simulation parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// The parameter file exists but could not be read
    #[error("cannot read parameter file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A parameter is outside its valid range
    #[error("invalid parameter {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: f64,
        reason: &'static str,
    },
}
