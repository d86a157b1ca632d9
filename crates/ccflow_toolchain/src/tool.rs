//! The external programs known to the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An external program family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tool {
    /// VHDL analyzer and simulator.
    #[serde(rename = "ghdl")]
    Ghdl,
    /// Synthesis framework, run with the GHDL plugin for VHDL.
    #[serde(rename = "yosys")]
    Yosys,
    /// Cologne Chip place-and-route and bitstream generator.
    #[serde(rename = "p_r")]
    PlaceRoute,
    /// Device programmer.
    #[serde(rename = "openFPGALoader")]
    OpenFpgaLoader,
    /// Waveform viewer.
    #[serde(rename = "gtkwave")]
    Gtkwave,
}

impl Tool {
    /// Every tool, in pipeline order.
    pub const ALL: [Tool; 5] = [
        Tool::Ghdl,
        Tool::Yosys,
        Tool::PlaceRoute,
        Tool::OpenFpgaLoader,
        Tool::Gtkwave,
    ];

    /// The configuration key, which is also the executable's base name.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Ghdl => "ghdl",
            Tool::Yosys => "yosys",
            Tool::PlaceRoute => "p_r",
            Tool::OpenFpgaLoader => "openFPGALoader",
            Tool::Gtkwave => "gtkwave",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tool name that matches no [`Tool`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}' (expected one of: ghdl, yosys, p_r, openFPGALoader, gtkwave)")]
pub struct UnknownToolError(pub String);

impl FromStr for Tool {
    type Err = UnknownToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownToolError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_config_keys() {
        for (tool, key) in Tool::ALL.iter().zip(ccflow_config::TOOL_NAMES) {
            assert_eq!(tool.name(), key);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("openfpgaloader".parse::<Tool>().unwrap(), Tool::OpenFpgaLoader);
        assert_eq!("P_R".parse::<Tool>().unwrap(), Tool::PlaceRoute);
        assert!("vivado".parse::<Tool>().is_err());
    }
}
