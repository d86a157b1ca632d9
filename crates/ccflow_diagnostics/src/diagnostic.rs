//! Structured diagnostic messages.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A file position a diagnostic points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The file the diagnostic refers to.
    pub path: PathBuf,
    /// One-based line number, when known.
    pub line: Option<u32>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// A structured diagnostic message.
///
/// Each diagnostic includes:
/// - A severity level and a stable code
/// - A primary message and an optional file location
/// - Notes (context such as captured tool output) and help lines
///   (the suggested next action)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Warning or error.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// One-line summary, e.g. `synthesis failed: yosys exited with code 1`.
    pub message: String,
    /// Where the problem was found, if it maps to a file.
    pub location: Option<Location>,
    /// Context lines, typically the tail of a tool's output.
    pub notes: Vec<String>,
    /// What to do next.
    pub help: Vec<String>,
}

impl Diagnostic {
    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Attaches a file location.
    pub fn at(mut self, path: impl Into<PathBuf>, line: Option<u32>) -> Self {
        self.location = Some(Location {
            path: path.into(),
            line,
        });
        self
    }

    /// Appends a context line.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Appends a suggested next action.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Pipeline, 101);
        let diag = Diagnostic::error(code, "synthesis failed");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "synthesis failed");
        assert_eq!(format!("{}", diag.code), "P101");
        assert!(diag.location.is_none());
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Source, 1);
        let diag = Diagnostic::warning(code, "no design units found")
            .at("src/empty.vhd", Some(3))
            .with_note("the file contains only comments")
            .with_help("remove the file or add an entity declaration");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
        assert_eq!(diag.location.unwrap().to_string(), "src/empty.vhd:3");
    }

    #[test]
    fn location_without_line() {
        let loc = Location {
            path: PathBuf::from("src/top.v"),
            line: None,
        };
        assert_eq!(loc.to_string(), "src/top.v");
    }
}
