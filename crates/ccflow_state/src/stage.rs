//! Pipeline stages and their prerequisites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One phase of the build pipeline.
///
/// The set is closed: every dispatch over stages is an exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// RTL simulation of the testbench.
    BehavioralSim,
    /// HDL to netlist.
    Synthesis,
    /// Simulation of the synthesized netlist.
    PostSynthSim,
    /// Place, route, and bitstream generation.
    Implementation,
    /// Simulation of the placed-and-routed netlist.
    PostImplSim,
    /// Programming the board.
    Upload,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::BehavioralSim,
        Stage::Synthesis,
        Stage::PostSynthSim,
        Stage::Implementation,
        Stage::PostImplSim,
        Stage::Upload,
    ];

    /// The persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BehavioralSim => "behavioral-sim",
            Stage::Synthesis => "synthesis",
            Stage::PostSynthSim => "post-synth-sim",
            Stage::Implementation => "implementation",
            Stage::PostImplSim => "post-impl-sim",
            Stage::Upload => "upload",
        }
    }

    /// The stage that must have succeeded before this one may run.
    pub fn prerequisite(self) -> Option<Stage> {
        match self {
            Stage::BehavioralSim | Stage::Synthesis => None,
            Stage::PostSynthSim | Stage::Implementation => Some(Stage::Synthesis),
            Stage::PostImplSim | Stage::Upload => Some(Stage::Implementation),
        }
    }

    /// Stages that consume this one's output, directly or transitively,
    /// in pipeline order.
    pub fn downstream(self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| {
                let mut cur = s.prerequisite();
                while let Some(p) = cur {
                    if p == self {
                        return true;
                    }
                    cur = p.prerequisite();
                }
                false
            })
            .collect()
    }

    /// Output directory relative to the project root.
    pub fn output_dir(self) -> &'static str {
        match self {
            Stage::BehavioralSim => "sim/behavioral",
            Stage::Synthesis => "synth",
            Stage::PostSynthSim => "sim/post-synthesis",
            Stage::Implementation => "impl",
            Stage::PostImplSim => "sim/post-implementation",
            Stage::Upload => "build/upload",
        }
    }

    /// Whether this is one of the three simulation stages.
    pub fn is_simulation(self) -> bool {
        matches!(
            self,
            Stage::BehavioralSim | Stage::PostSynthSim | Stage::PostImplSim
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage name that matches no [`Stage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected one of: behavioral-sim, synthesis, post-synth-sim, implementation, post-impl-sim, upload)")]
pub struct UnknownStageError(pub String);

impl FromStr for Stage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stage = match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "behavioral-sim" | "behavioral" | "sim" => Stage::BehavioralSim,
            "synthesis" | "synth" => Stage::Synthesis,
            "post-synth-sim" | "post-synthesis" => Stage::PostSynthSim,
            "implementation" | "impl" | "pnr" => Stage::Implementation,
            "post-impl-sim" | "post-implementation" => Stage::PostImplSim,
            "upload" | "program" => Stage::Upload,
            _ => return Err(UnknownStageError(s.to_string())),
        };
        Ok(stage)
    }
}
