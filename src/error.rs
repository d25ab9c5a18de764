use std::path::PathBuf;
use thiserror::Error;

/// Conditions the shell needs to tell apart from generic failures.
///
/// Everything else travels as [`anyhow::Error`] and is logged by the driver.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Raised inside a running command once an interrupt asked it to stop.
    #[error("command cancelled")]
    Cancelled,
    /// The line editor could not be attached to the process terminal.
    #[error("interactive terminal unavailable: {0}")]
    TerminalUnavailable(String),
    /// The startup settings file could not be applied.
    #[error("failed to apply settings from {path}: {reason}")]
    Settings { path: PathBuf, reason: String },
}

impl ShellError {
    /// True when `err` (or anything in its chain) is a cancellation.
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        err.chain()
            .any(|cause| matches!(cause.downcast_ref::<ShellError>(), Some(ShellError::Cancelled)))
    }
}
