//! Per-project pipeline state and its on-disk record.
//!
//! [`ProjectState`] aggregates everything the orchestrator knows about a
//! project: the source index, the hierarchy snapshot, one [`StageRecord`]
//! per [`Stage`], and the active configuration. The [`store`] module
//! persists it as JSON under `config/`, replacing the previous record
//! atomically, and [`lock`] keeps two runs from sharing one project.

#![warn(missing_docs)]

pub mod error;
pub mod lock;
pub mod manifest;
pub mod project;
pub mod record;
pub mod stage;
pub mod status;
pub mod store;

pub use error::{CorruptStateError, StoreError};
pub use lock::{LockHolder, RunLock, LOCK_FILE};
pub use manifest::{Artifact, StageManifest};
pub use project::ProjectState;
pub use record::{FailureReport, StageRecord};
pub use stage::{Stage, UnknownStageError};
pub use status::StageStatus;
pub use store::{load, save, state_path, FORMAT_VERSION, STATE_FILE};
