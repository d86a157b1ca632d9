//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;

/// Formats diagnostics into strings for a particular output target.
pub trait DiagnosticRenderer {
    /// Formats one diagnostic, including its trailing newline.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[P201]: synthesis failed
///   --> synth/counter_synth.log
///    = note: ERROR: Module `foo' referenced in module `top' is not part of the design.
///    = help: check the instantiation names in src/top.vhd
/// ```
pub struct TerminalRenderer {
    /// Emit ANSI colour sequences in the header line.
    pub color: bool,
}

impl TerminalRenderer {
    /// A renderer for stderr.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        if self.color {
            out.push_str(&format!(
                "{}{}[{}]\x1b[0m\x1b[1m: {}\x1b[0m\n",
                diag.severity.ansi(),
                diag.severity,
                diag.code,
                diag.message
            ));
        } else {
            out.push_str(&format!(
                "{}[{}]: {}\n",
                diag.severity, diag.code, diag.message
            ));
        }

        if let Some(loc) = &diag.location {
            out.push_str(&format!("  --> {loc}\n"));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}
