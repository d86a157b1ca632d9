//! Non-fatal problems found while indexing.

use std::fmt;
use std::path::{Path, PathBuf};

use ccflow_diagnostics::{Category, Diagnostic, DiagnosticCode};
use serde::{Deserialize, Serialize};

/// What went wrong with a file or directory during indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseWarningKind {
    /// The file or directory could not be read.
    Unreadable(String),
    /// A configured source directory does not exist.
    MissingDirectory,
    /// The file has an HDL extension but no declaration was recognised.
    NoDeclarations,
    /// A declaration keyword was found without a usable name.
    Malformed(String),
    /// The unit is also declared in an earlier file, which takes precedence.
    DuplicateUnit {
        /// The duplicated unit name.
        name: String,
        /// The file whose declaration is kept.
        first: PathBuf,
    },
    /// An architecture body names an entity that no file declares.
    OrphanArchitecture {
        /// The architecture name.
        architecture: String,
        /// The entity it claims to implement.
        entity: String,
    },
}

/// A non-fatal indexing problem tied to a file (and line, when known).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// The file or directory concerned.
    pub path: PathBuf,
    /// One-based line, when the problem is local to a declaration.
    pub line: Option<u32>,
    /// The problem.
    pub kind: ParseWarningKind,
}

impl ParseWarning {
    /// Creates a warning.
    pub fn new(path: &Path, line: Option<u32>, kind: ParseWarningKind) -> Self {
        Self {
            path: path.to_path_buf(),
            line,
            kind,
        }
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self.kind {
            ParseWarningKind::Unreadable(_) => 1,
            ParseWarningKind::MissingDirectory => 2,
            ParseWarningKind::NoDeclarations => 3,
            ParseWarningKind::Malformed(_) => 4,
            ParseWarningKind::DuplicateUnit { .. } => 5,
            ParseWarningKind::OrphanArchitecture { .. } => 6,
        };
        DiagnosticCode::new(Category::Source, number)
    }

    /// Converts the warning into a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning(self.code(), self.to_string()).at(&self.path, self.line);
        match &self.kind {
            ParseWarningKind::NoDeclarations => {
                diag.with_help("the file is skipped; add an entity or module declaration")
            }
            ParseWarningKind::DuplicateUnit { first, .. } => {
                diag.with_note(format!("first declared in {}", first.display()))
            }
            ParseWarningKind::MissingDirectory => {
                diag.with_help("create the directory or remove it from [project] sources")
            }
            _ => diag,
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseWarningKind::Unreadable(reason) => write!(f, "cannot read file: {reason}"),
            ParseWarningKind::MissingDirectory => write!(f, "source directory does not exist"),
            ParseWarningKind::NoDeclarations => {
                write!(f, "no design unit declarations could be identified")
            }
            ParseWarningKind::Malformed(what) => write!(f, "malformed declaration: {what}"),
            ParseWarningKind::DuplicateUnit { name, .. } => {
                write!(f, "design unit `{name}` is declared more than once")
            }
            ParseWarningKind::OrphanArchitecture {
                architecture,
                entity,
            } => write!(
                f,
                "architecture `{architecture}` implements undeclared entity `{entity}`"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_carries_location() {
        let w = ParseWarning::new(
            Path::new("src/a.vhd"),
            Some(4),
            ParseWarningKind::Malformed("`entity` without a name".into()),
        );
        let d = w.to_diagnostic();
        assert_eq!(d.code.to_string(), "S004");
        assert_eq!(d.location.unwrap().to_string(), "src/a.vhd:4");
        assert!(d.message.contains("without a name"));
    }

    #[test]
    fn duplicate_mentions_first_file() {
        let w = ParseWarning::new(
            Path::new("src/b.vhd"),
            Some(1),
            ParseWarningKind::DuplicateUnit {
                name: "alu".into(),
                first: PathBuf::from("src/a.vhd"),
            },
        );
        let d = w.to_diagnostic();
        assert_eq!(d.notes, vec!["first declared in src/a.vhd".to_string()]);
    }
}
