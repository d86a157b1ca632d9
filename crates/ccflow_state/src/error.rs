//! Persistence errors.

use std::path::PathBuf;

/// The persisted record is missing or cannot be trusted.
///
/// Loading never falls back to an empty state; the caller decides whether
/// to rebuild (for example by re-indexing).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptStateError {
    /// No record exists at the path.
    #[error("no project state at {}", .0.display())]
    Missing(PathBuf),
    /// The file exists but could not be read.
    #[error("cannot read project state {}: {reason}", path.display())]
    Unreadable {
        /// The record's path.
        path: PathBuf,
        /// The I/O error text.
        reason: String,
    },
    /// The contents are not a valid record.
    #[error("malformed project state {}: {reason}", path.display())]
    Malformed {
        /// The record's path.
        path: PathBuf,
        /// The parse error text.
        reason: String,
    },
    /// The record was written by an incompatible version.
    #[error("project state {} has unsupported format version {found}", path.display())]
    UnsupportedVersion {
        /// The record's path.
        path: PathBuf,
        /// The version found in the file.
        found: u32,
    },
}

/// Errors from the project state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Loading failed.
    #[error(transparent)]
    Corrupt(#[from] CorruptStateError),
    /// Writing failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// The file being written.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}
