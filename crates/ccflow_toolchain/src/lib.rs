//! Location of the external programs the pipeline drives.
//!
//! The [`Registry`] maps each [`Tool`] to an executable, preferring a path
//! configured in `ccflow.toml` and falling back to a `PATH` search. Results
//! are cached for the life of the registry. Nothing here ever launches a
//! tool; usability is only proven by the first real invocation.

#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod tool;

pub use error::NotFoundError;
pub use registry::{Registry, ResolutionMode, ToolchainEntry};
pub use tool::{Tool, UnknownToolError};
