//! Strategy presets and enumerated tool options.
//!
//! These are the semantic choices a user makes; the stage executors turn
//! them into tool flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Yosys optimisation strategy applied after `synth_gatemate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisStrategy {
    /// Minimise LUT count.
    Area,
    /// Fast, lightly optimised run.
    Speed,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Extra optimisation rounds.
    Quality,
    /// Delay-targeted mapping.
    Timing,
    /// Everything, several times.
    Extreme,
}

impl SynthesisStrategy {
    /// Additional Yosys passes run after generic synthesis.
    pub fn passes(self) -> &'static [&'static str] {
        match self {
            SynthesisStrategy::Area => &["abc -lut 4 -dress", "opt_clean", "opt -full", "clean"],
            SynthesisStrategy::Speed => &["abc -fast", "opt", "clean"],
            SynthesisStrategy::Balanced => &["abc", "opt", "clean"],
            SynthesisStrategy::Quality => &["opt -full", "abc", "opt -full", "clean"],
            SynthesisStrategy::Timing => &[
                "abc -lut 4",
                "opt_clean",
                "abc -lut 4 -dff -D 0.1",
                "opt -full",
                "clean",
            ],
            SynthesisStrategy::Extreme => &[
                "opt -full",
                "abc -lut 4",
                "opt -full -fine",
                "abc -lut 4 -dff -D 0.01",
                "opt -full -fine",
                "clean",
            ],
        }
    }
}

/// Effort level for place-and-route phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    /// Low effort.
    Low,
    /// Medium effort.
    Medium,
    /// High effort.
    High,
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        })
    }
}

/// Settings implied by an [`ImplementationStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyProfile {
    /// Overall effort.
    pub effort: Effort,
    /// Placement effort.
    pub place_effort: Effort,
    /// Routing effort.
    pub route_effort: Effort,
    /// Optimise for timing.
    pub timing_driven: bool,
    /// Optimise for routing congestion.
    pub congestion_driven: bool,
}

/// Place-and-route strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplementationStrategy {
    /// Maximum performance.
    Speed,
    /// Minimum resource usage.
    Area,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Lower power.
    Power,
    /// Spread logic to relieve routing pressure.
    Congestion,
}

impl ImplementationStrategy {
    /// The effort levels and goals behind this strategy.
    pub fn profile(self) -> StrategyProfile {
        use Effort::*;
        let (effort, place_effort, route_effort, timing_driven, congestion_driven) = match self {
            ImplementationStrategy::Speed => (High, High, High, true, false),
            ImplementationStrategy::Area => (Medium, Medium, Medium, false, true),
            ImplementationStrategy::Balanced => (Medium, Medium, Medium, true, true),
            ImplementationStrategy::Power => (Medium, Low, Medium, false, false),
            ImplementationStrategy::Congestion => (High, High, High, false, true),
        };
        StrategyProfile {
            effort,
            place_effort,
            route_effort,
            timing_driven,
            congestion_driven,
        }
    }
}

/// VHDL language revision passed to GHDL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VhdlStandard {
    /// IEEE 1076-1993.
    #[serde(rename = "VHDL-1993")]
    Vhdl1993,
    /// IEEE 1076-1993 with relaxed rules.
    #[serde(rename = "VHDL-1993c")]
    Vhdl1993c,
    /// IEEE 1076-2008.
    #[default]
    #[serde(rename = "VHDL-2008")]
    Vhdl2008,
}

impl VhdlStandard {
    /// The `--std=` flag value.
    pub fn ghdl_std(self) -> &'static str {
        match self {
            VhdlStandard::Vhdl1993 => "93",
            VhdlStandard::Vhdl1993c => "93c",
            VhdlStandard::Vhdl2008 => "08",
        }
    }
}

/// IEEE library flavour passed to GHDL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IeeeLibrary {
    /// Synopsys arithmetic packages.
    #[default]
    Synopsys,
    /// Mentor arithmetic packages.
    Mentor,
    /// Strict IEEE only.
    None,
}

impl IeeeLibrary {
    /// The `--ieee=` flag value.
    pub fn ghdl_ieee(self) -> &'static str {
        match self {
            IeeeLibrary::Synopsys => "synopsys",
            IeeeLibrary::Mentor => "mentor",
            IeeeLibrary::None => "none",
        }
    }
}

/// Simulation time unit accepted by GHDL's `--stop-time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Femtoseconds.
    Fs,
    /// Picoseconds.
    Ps,
    /// Nanoseconds.
    #[default]
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
    /// Seconds.
    Sec,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::Sec => "sec",
        })
    }
}

/// Where the programmer writes the bitstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramMode {
    /// Volatile configuration memory; lost on power cycle.
    #[default]
    Sram,
    /// Persistent SPI flash.
    Flash,
}

impl fmt::Display for ProgramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgramMode::Sram => "sram",
            ProgramMode::Flash => "flash",
        })
    }
}
