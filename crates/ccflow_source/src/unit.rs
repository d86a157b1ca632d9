//! Design units as recorded by the Source Index.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::language::HdlLanguage;

/// Whether a unit is part of the design or only drives it in simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    /// Synthesizable design logic.
    Design,
    /// Simulation-only stimulus wrapper.
    Testbench,
}

impl UnitRole {
    /// Classifies a unit by naming convention and location.
    ///
    /// Names ending in `_tb` or starting with `tb_`, and anything under a
    /// `testbench` directory, are testbenches.
    pub fn classify(name: &str, path: &Path) -> Self {
        let lower = name.to_ascii_lowercase();
        let by_name = lower.ends_with("_tb") || lower.starts_with("tb_") || lower == "tb";
        let by_dir = path.components().any(|c| match c {
            Component::Normal(part) => part.eq_ignore_ascii_case("testbench"),
            _ => false,
        });
        if by_name || by_dir {
            UnitRole::Testbench
        } else {
            UnitRole::Design
        }
    }
}

/// A named module or entity together with its implementations.
///
/// Re-indexing replaces units wholesale; nothing mutates a unit after the
/// index is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignUnit {
    /// Unit name. VHDL names are lower-cased.
    pub name: String,
    /// The file containing the declaration.
    pub path: PathBuf,
    /// Line of the declaration.
    pub line: u32,
    /// Language of the declaring file.
    pub language: HdlLanguage,
    /// Design or testbench.
    pub role: UnitRole,
    /// Architecture names (VHDL). Verilog modules have none.
    pub implementations: Vec<String>,
    /// Names of the units this one instantiates.
    pub references: BTreeSet<String>,
    /// Files holding architecture bodies that live apart from the declaration.
    pub body_files: BTreeSet<PathBuf>,
}

impl DesignUnit {
    /// Returns `true` for testbench units.
    pub fn is_testbench(&self) -> bool {
        self.role == UnitRole::Testbench
    }

    /// Every file that must be compiled for this unit, declaration first.
    pub fn files(&self) -> Vec<&Path> {
        let mut files = vec![self.path.as_path()];
        files.extend(
            self.body_files
                .iter()
                .map(PathBuf::as_path)
                .filter(|p| *p != self.path),
        );
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_suffix_and_prefix() {
        let p = Path::new("src/x.vhd");
        assert_eq!(UnitRole::classify("counter_tb", p), UnitRole::Testbench);
        assert_eq!(UnitRole::classify("TB_Counter", p), UnitRole::Testbench);
        assert_eq!(UnitRole::classify("counter", p), UnitRole::Design);
        assert_eq!(UnitRole::classify("tbird", p), UnitRole::Design);
    }

    #[test]
    fn classify_by_directory() {
        let p = Path::new("proj/testbench/stim.vhd");
        assert_eq!(UnitRole::classify("stimulus", p), UnitRole::Testbench);
    }

    #[test]
    fn files_lists_declaration_first() {
        let unit = DesignUnit {
            name: "alu".into(),
            path: PathBuf::from("src/alu.vhd"),
            line: 1,
            language: HdlLanguage::Vhdl,
            role: UnitRole::Design,
            implementations: vec!["rtl".into()],
            references: BTreeSet::new(),
            body_files: [PathBuf::from("src/alu_rtl.vhd"), PathBuf::from("src/alu.vhd")]
                .into_iter()
                .collect(),
        };
        assert_eq!(
            unit.files(),
            vec![Path::new("src/alu.vhd"), Path::new("src/alu_rtl.vhd")]
        );
    }
}
