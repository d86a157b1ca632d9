//! Resolution failures.

use crate::tool::Tool;
use ccflow_diagnostics::{Category, Diagnostic, DiagnosticCode};
use std::path::PathBuf;

/// A tool could be located neither at its configured path nor on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{tool} not found: {reason}")]
pub struct NotFoundError {
    /// The tool that was requested.
    pub tool: Tool,
    /// The configured path that was rejected, if one was set.
    pub configured: Option<PathBuf>,
    /// Why resolution failed.
    pub reason: String,
}

impl NotFoundError {
    /// Converts the failure into a `T001` diagnostic with a fix-it hint.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = DiagnosticCode::new(Category::Toolchain, 1);
        let mut diag = Diagnostic::error(code, self.to_string());
        if let Some(path) = &self.configured {
            diag = diag.with_note(format!("configured path: {}", path.display()));
        }
        diag.with_help(format!(
            "install {tool} or run `ccflow toolchain set-path {tool} <PATH>`",
            tool = self.tool
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_mentions_set_path() {
        let err = NotFoundError {
            tool: Tool::Yosys,
            configured: Some(PathBuf::from("/opt/yosys")),
            reason: "configured path does not exist".into(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.to_string(), "T001");
        assert_eq!(diag.message, "yosys not found: configured path does not exist");
        assert_eq!(diag.notes.len(), 1);
        assert!(diag.help[0].contains("set-path yosys"));
    }
}
