//! Loading and atomically saving the project record.

use crate::error::{CorruptStateError, StoreError};
use crate::project::ProjectState;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Location of the record relative to the project root.
pub const STATE_FILE: &str = "config/project_state.json";

/// Version written into every record. Others are rejected on load.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct Envelope<'a> {
    format_version: u32,
    state: &'a ProjectState,
}

#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

#[derive(Deserialize)]
struct OwnedEnvelope {
    state: ProjectState,
}

/// The record path for a project rooted at `root`.
pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

/// Reads a record written by [`save`].
pub fn load(path: &Path) -> Result<ProjectState, CorruptStateError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CorruptStateError::Missing(path.to_path_buf())
        } else {
            CorruptStateError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;
    let malformed = |e: serde_json::Error| CorruptStateError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let header: Header = serde_json::from_str(&text).map_err(malformed)?;
    if header.format_version != FORMAT_VERSION {
        return Err(CorruptStateError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.format_version,
        });
    }
    let envelope: OwnedEnvelope = serde_json::from_str(&text).map_err(malformed)?;
    Ok(envelope.state)
}

/// Writes `state` to `path`, replacing any previous record in one rename.
///
/// A crash at any point leaves either the old record or the new one.
pub fn save(state: &ProjectState, path: &Path) -> Result<(), StoreError> {
    let io = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io)?;
    let text = serde_json::to_string_pretty(&Envelope {
        format_version: FORMAT_VERSION,
        state,
    })
    .map_err(|e| io(std::io::Error::other(e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io)?;
    tmp.write_all(text.as_bytes()).map_err(io)?;
    tmp.as_file().sync_all().map_err(io)?;
    tmp.persist(path).map_err(|e| io(e.error))?;
    log::debug!("saved project state to {}", path.display());
    Ok(())
}
