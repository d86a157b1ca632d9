//! Catalogue of programmable boards.

use crate::strategy::ProgramMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The board used when `[upload]` names none.
pub const DEFAULT_BOARD: &str = "olimex_gatemateevb";

/// A board the programmer knows how to talk to.
///
/// User boards are declared as `[boards.<id>]` tables in `ccflow.toml` and
/// shadow built-in entries with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Human-readable name.
    pub name: String,
    /// Identifier passed to `openFPGALoader -b`.
    pub loader_id: String,
    /// Interfaces the board exposes (`jtag`, `spi`).
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Interface used when the user names none; `auto` lets the loader pick.
    #[serde(default = "default_interface")]
    pub default_interface: String,
    /// Programming modes the board supports.
    #[serde(default = "default_modes")]
    pub modes: Vec<ProgramMode>,
}

fn default_interface() -> String {
    "auto".to_string()
}

fn default_modes() -> Vec<ProgramMode> {
    vec![ProgramMode::Sram, ProgramMode::Flash]
}

impl Board {
    fn builtin(name: &str, loader_id: &str, interfaces: &[&str], default_interface: &str) -> Self {
        Board {
            name: name.to_string(),
            loader_id: loader_id.to_string(),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            default_interface: default_interface.to_string(),
            modes: default_modes(),
        }
    }

    /// Returns `true` if the board can be programmed in `mode`.
    pub fn supports(&self, mode: ProgramMode) -> bool {
        self.modes.contains(&mode)
    }

    /// The `--cable` value to pass, or `None` to let the loader detect it.
    pub fn cable<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        match requested.unwrap_or(&self.default_interface) {
            "auto" | "" => None,
            other => Some(other),
        }
    }
}

/// The GateMate boards shipped with the tool, keyed by id.
pub fn builtin_boards() -> BTreeMap<String, Board> {
    [
        (
            DEFAULT_BOARD,
            Board::builtin("Olimex GateMate EVB", DEFAULT_BOARD, &["jtag", "spi"], "auto"),
        ),
        (
            "gatemate_evb_jtag",
            Board::builtin(
                "Cologne Chip GateMate EVB (JTAG)",
                "gatemate_evb_jtag",
                &["jtag"],
                "jtag",
            ),
        ),
        (
            "gatemate_evb_spi",
            Board::builtin(
                "Cologne Chip GateMate EVB (SPI)",
                "gatemate_evb_spi",
                &["spi"],
                "spi",
            ),
        ),
        (
            "gatemate_pgm_spi",
            Board::builtin(
                "Cologne Chip GateMate Programmer (SPI)",
                "gatemate_pgm_spi",
                &["spi"],
                "spi",
            ),
        ),
    ]
    .into_iter()
    .map(|(id, board)| (id.to_string(), board))
    .collect()
}
