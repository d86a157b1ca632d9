//! Diagnostic severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the operation that raised a diagnostic went on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Indexing or the stage carried on: a black box, a duplicate unit.
    Warning,
    /// The request was refused or the stage failed.
    Error,
}

impl Severity {
    pub(crate) fn ansi(self) -> &'static str {
        match self {
            Severity::Warning => "\x1b[1;33m",
            Severity::Error => "\x1b[1;31m",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_outrank_warnings() {
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn persisted_in_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
        assert_eq!(
            serde_json::from_str::<Severity>("\"error\"").unwrap(),
            Severity::Error
        );
    }
}
