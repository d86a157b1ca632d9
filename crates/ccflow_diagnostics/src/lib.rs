//! Diagnostic creation, severity management, and terminal rendering.
//!
//! Indexing warnings, hierarchy problems, and stage failures are all reported
//! as structured [`Diagnostic`] values. Each carries a severity, a stable code,
//! an optional file location, explanatory notes (such as the last lines a tool
//! printed), and help lines holding the suggested next action.
//! [`TerminalRenderer`] formats them for stderr.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Location};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
