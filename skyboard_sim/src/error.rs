//! Error types for the Skyboard runtime.

use skyboard_core::ParamsError;
use thiserror::Error;

/// Errors that stop the system launcher or a unit that cannot continue.
#[derive(Debug, Error)]
pub enum SystemError {
    /// Parameters could not be loaded
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// The watchdog never received its unit roster
    #[error("watchdog roster was not delivered")]
    RosterLost,

    /// A unit task panicked or was cancelled
    #[error("unit {role} did not finish cleanly: {reason}")]
    Join { role: &'static str, reason: String },

    /// The snapshot export sink failed
    #[error("snapshot export to '{path}' failed: {source}")]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
