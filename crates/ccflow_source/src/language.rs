//! HDL language detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// HDL language detected from a file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdlLanguage {
    /// VHDL (`.vhd`, `.vhdl`).
    Vhdl,
    /// Verilog (`.v`).
    Verilog,
    /// SystemVerilog (`.sv`).
    SystemVerilog,
}

impl HdlLanguage {
    /// Detects the HDL language from a file's extension.
    ///
    /// Returns `None` for unrecognized extensions. The match ignores case so
    /// `TOP.VHD` is picked up on case-insensitive filesystems.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vhd" | "vhdl" => Some(HdlLanguage::Vhdl),
            "v" => Some(HdlLanguage::Verilog),
            "sv" => Some(HdlLanguage::SystemVerilog),
            _ => None,
        }
    }

    /// VHDL identifiers are case-insensitive and are normalised to lower case.
    pub fn folds_case(self) -> bool {
        self == HdlLanguage::Vhdl
    }
}

impl fmt::Display for HdlLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HdlLanguage::Vhdl => "VHDL",
            HdlLanguage::Verilog => "Verilog",
            HdlLanguage::SystemVerilog => "SystemVerilog",
        })
    }
}
