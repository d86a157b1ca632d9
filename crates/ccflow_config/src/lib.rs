//! Parsing and validation of `ccflow.toml` project configuration files.
//!
//! This crate reads the project configuration into a strongly-typed
//! [`ProjectConfig`]: synthesis, implementation, simulation, and upload
//! options, explicit toolchain paths, and user-defined boards and simulation
//! profiles, which [`profiles`] exports and imports. It also owns the small
//! per-user [`UserSettings`] record that remembers the most recently opened
//! project.

#![warn(missing_docs)]

pub mod boards;
pub mod error;
pub mod loader;
pub mod profiles;
pub mod settings;
pub mod strategy;
pub mod types;

pub use boards::{builtin_boards, Board};
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, save_config, validate_config, CONFIG_FILE};
pub use profiles::{export_profile, read_profile, ProfileFile};
pub use settings::UserSettings;
pub use strategy::*;
pub use types::*;
