//! Diagnostic codes.
//!
//! A code is one letter naming the layer that raised it and three digits:
//! `S1xx` for indexing and hierarchy problems, `T0xx` for tools that cannot
//! be found, `P0xx` for refused stage requests and `P2xx` for stages that
//! ran and failed, `C0xx` for configuration and the project record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The layer a diagnostic comes from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Source index and hierarchy graph (`S`).
    Source,
    /// Toolchain registry (`T`).
    Toolchain,
    /// Orchestrator and stage results (`P`).
    Pipeline,
    /// `ccflow.toml` and `project_state.json` (`C`).
    Config,
}

impl Category {
    /// The letter codes of this category start with.
    pub fn prefix(self) -> char {
        match self {
            Category::Source => 'S',
            Category::Toolchain => 'T',
            Category::Pipeline => 'P',
            Category::Config => 'C',
        }
    }
}

/// A category plus a number, shown as `P201`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Which layer raised it.
    pub category: Category,
    /// Number within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_letter_and_three_digits() {
        let shown: Vec<String> = [
            DiagnosticCode::new(Category::Source, 101),
            DiagnosticCode::new(Category::Toolchain, 1),
            DiagnosticCode::new(Category::Pipeline, 2),
            DiagnosticCode::new(Category::Config, 7),
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(shown, ["S101", "T001", "P002", "C007"]);
    }

    #[test]
    fn stage_failure_codes_sort_by_number() {
        let mut codes = vec![
            DiagnosticCode::new(Category::Pipeline, 206),
            DiagnosticCode::new(Category::Pipeline, 201),
        ];
        codes.sort_by_key(|c| c.number);
        assert_eq!(codes[0].to_string(), "P201");
    }

    #[test]
    fn serializes_as_a_struct() {
        let code = DiagnosticCode::new(Category::Toolchain, 1);
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#"{"category":"Toolchain","number":1}"#);
        assert_eq!(serde_json::from_str::<DiagnosticCode>(&json).unwrap(), code);
    }
}
