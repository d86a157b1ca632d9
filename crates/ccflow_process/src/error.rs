//! Process execution errors.

use std::path::PathBuf;
use std::time::Duration;

/// Why a process did not run to completion.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Cancellation was requested and the process was terminated.
    #[error("cancelled")]
    Cancelled,

    /// The timeout expired and the process was terminated.
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The program could not be started.
    #[error("failed to launch {}: {source}", program.display())]
    LaunchFailed {
        /// The program that was launched.
        program: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Waiting on the process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            RunError::TimedOut(Duration::from_secs(300)).to_string(),
            "timed out after 300s"
        );
        let err = RunError::LaunchFailed {
            program: PathBuf::from("/opt/yosys"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to launch /opt/yosys: "));
    }
}
