//! Configuration types deserialized from `ccflow.toml`.

use crate::boards::{builtin_boards, Board, DEFAULT_BOARD};
use crate::error::ConfigError;
use crate::strategy::{
    IeeeLibrary, ImplementationStrategy, ProgramMode, SynthesisStrategy, TimeUnit, VhdlStandard,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Names accepted as keys of the `[toolchain]` table.
pub const TOOL_NAMES: [&str; 5] = ["ghdl", "yosys", "p_r", "openFPGALoader", "gtkwave"];

/// The top-level project configuration parsed from `ccflow.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Synthesis options.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    /// Place-and-route options.
    #[serde(default)]
    pub implementation: ImplementationConfig,
    /// Simulation options.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Programming options.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Explicit tool locations.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// User-defined boards, merged over the built-in catalogue.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub boards: BTreeMap<String, Board>,
}

impl ProjectConfig {
    /// A default configuration for a freshly created project.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectConfig {
            project: ProjectMeta {
                name: name.into(),
                description: String::new(),
                sources: default_sources(),
            },
            synthesis: SynthesisConfig::default(),
            implementation: ImplementationConfig::default(),
            simulation: SimulationConfig::default(),
            upload: UploadConfig::default(),
            toolchain: ToolchainConfig::default(),
            boards: BTreeMap::new(),
        }
    }

    /// Built-in boards overlaid with the user's `[boards]` entries.
    pub fn all_boards(&self) -> BTreeMap<String, Board> {
        let mut boards = builtin_boards();
        boards.extend(self.boards.iter().map(|(k, v)| (k.clone(), v.clone())));
        boards
    }

    /// Looks up the board selected in `[upload]`.
    pub fn selected_board(&self) -> Result<Board, ConfigError> {
        let mut boards = self.all_boards();
        match boards.remove(&self.upload.board) {
            Some(board) => Ok(board),
            None => Err(ConfigError::UnknownOption {
                kind: "board",
                name: self.upload.board.clone(),
                valid: boards.into_keys().collect(),
            }),
        }
    }
}

/// Core project metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// The project name; also the default constraint file stem.
    pub name: String,
    /// A brief description of the project.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Source directories scanned by the index, relative to the project root.
    #[serde(default = "default_sources")]
    pub sources: Vec<PathBuf>,
}

fn default_sources() -> Vec<PathBuf> {
    vec![PathBuf::from("src"), PathBuf::from("testbench")]
}

/// `[synthesis]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Optimisation strategy.
    #[serde(default)]
    pub strategy: SynthesisStrategy,
    /// VHDL revision.
    #[serde(default)]
    pub vhdl_standard: VhdlStandard,
    /// IEEE library flavour.
    #[serde(default)]
    pub ieee_library: IeeeLibrary,
    /// Explicit synthesis top; required when the hierarchy has several roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    /// Per-invocation timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `[implementation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationConfig {
    /// Place-and-route strategy.
    #[serde(default)]
    pub strategy: ImplementationStrategy,
    /// Target device.
    #[serde(default = "default_device")]
    pub device: String,
    /// Constraint file relative to the project root. Discovered under
    /// `constraints/` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_file: Option<PathBuf>,
    /// Run static timing analysis after bitstream generation.
    #[serde(default)]
    pub timing_analysis: bool,
    /// Write a post-implementation VHDL netlist for simulation.
    #[serde(default = "default_true")]
    pub write_netlist: bool,
    /// Per-invocation timeout. P&R defaults to five minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_device() -> String {
    "CCGM1A1".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ImplementationConfig {
    fn default() -> Self {
        ImplementationConfig {
            strategy: ImplementationStrategy::default(),
            device: default_device(),
            constraint_file: None,
            timing_analysis: false,
            write_netlist: true,
            timeout_secs: None,
        }
    }
}

/// A named simulation length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimProfile {
    /// Stop time in `unit`s.
    pub duration: u64,
    /// Unit of `duration`.
    #[serde(default)]
    pub unit: TimeUnit,
    /// Free text shown when profiles are listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SimProfile {
    /// A profile without a description.
    pub fn new(duration: u64, unit: TimeUnit) -> Self {
        SimProfile {
            duration,
            unit,
            description: None,
        }
    }
}

/// The profiles available without any configuration.
pub fn builtin_profiles() -> BTreeMap<String, SimProfile> {
    [
        ("quick", 100, "short smoke test"),
        ("standard", 1000, "default length"),
        ("extended", 10000, "long run for slow counters"),
    ]
    .into_iter()
    .map(|(name, duration, description)| {
        (
            name.to_string(),
            SimProfile {
                description: Some(description.to_string()),
                ..SimProfile::new(duration, TimeUnit::Ns)
            },
        )
    })
    .collect()
}

/// The profile name that selects `duration` and `time_unit` directly.
pub const CUSTOM_PROFILE: &str = "custom";

/// `[simulation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Profile name, or `custom` to use `duration` and `time_unit` directly.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Stop time for the `custom` profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Unit for the `custom` profile.
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Explicit simulation top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testbench: Option<String>,
    /// Per-invocation timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// User profiles from `[simulation.profiles.<name>]`, merged over the
    /// built-in ones.
    #[serde(default, alias = "presets", skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, SimProfile>,
}

fn default_profile() -> String {
    "standard".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            profile: default_profile(),
            duration: None,
            time_unit: TimeUnit::default(),
            testbench: None,
            timeout_secs: None,
            profiles: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    /// Every selectable profile: the built-in ones with user profiles of
    /// the same name taking their place.
    pub fn all_profiles(&self) -> BTreeMap<String, SimProfile> {
        let mut all = builtin_profiles();
        all.extend(self.profiles.clone());
        all
    }

    /// Looks up a built-in or user profile.
    pub fn find_profile(&self, name: &str) -> Result<SimProfile, ConfigError> {
        let mut all = self.all_profiles();
        match all.remove(name) {
            Some(profile) => Ok(profile),
            None => {
                let mut valid: Vec<String> = all.into_keys().collect();
                valid.push(CUSTOM_PROFILE.to_string());
                Err(ConfigError::UnknownOption {
                    kind: "simulation profile",
                    name: name.to_string(),
                    valid,
                })
            }
        }
    }

    /// Resolves the active profile to a stop time.
    pub fn stop_time(&self) -> Result<SimProfile, ConfigError> {
        if self.profile == CUSTOM_PROFILE {
            return match self.duration {
                Some(duration) => Ok(SimProfile::new(duration, self.time_unit)),
                None => Err(ConfigError::MissingField("simulation.duration".to_string())),
            };
        }
        self.find_profile(&self.profile)
    }

    /// GHDL `--stop-time` value such as `1000ns`.
    pub fn stop_time_arg(&self) -> Result<String, ConfigError> {
        let profile = self.stop_time()?;
        Ok(format!("{}{}", profile.duration, profile.unit))
    }

    /// Adds or replaces the user profile `name`. Returns the profile it
    /// replaced.
    pub fn create_profile(
        &mut self,
        name: &str,
        profile: SimProfile,
    ) -> Result<Option<SimProfile>, ConfigError> {
        check_profile(name, &profile)?;
        Ok(self.profiles.insert(name.to_string(), profile))
    }

    /// Removes the user profile `name`.
    ///
    /// The selected profile can only be removed when a built-in profile of
    /// the same name remains to take its place.
    pub fn delete_profile(&mut self, name: &str) -> Result<SimProfile, ConfigError> {
        let shadows_builtin = builtin_profiles().contains_key(name);
        if self.profile == name && self.profiles.contains_key(name) && !shadows_builtin {
            return Err(ConfigError::ValidationError(format!(
                "simulation profile '{name}' is selected; select another one first"
            )));
        }
        self.profiles
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownOption {
                kind: "user simulation profile",
                name: name.to_string(),
                valid: self.profiles.keys().cloned().collect(),
            })
    }
}

/// Rejects profile names and lengths that could never be selected or run.
pub(crate) fn check_profile(name: &str, profile: &SimProfile) -> Result<(), ConfigError> {
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_name {
        return Err(ConfigError::ValidationError(format!(
            "simulation profile name '{name}' may only use letters, digits, '_' and '-'"
        )));
    }
    if name == CUSTOM_PROFILE {
        return Err(ConfigError::ValidationError(format!(
            "'{CUSTOM_PROFILE}' is reserved for simulation.duration"
        )));
    }
    if profile.duration == 0 {
        return Err(ConfigError::ValidationError(format!(
            "simulation profile '{name}' must run for a nonzero duration"
        )));
    }
    Ok(())
}

/// `[upload]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Board id from the catalogue.
    #[serde(default = "default_board")]
    pub board: String,
    /// SRAM or flash.
    #[serde(default)]
    pub mode: ProgramMode,
    /// Read back and compare after flashing.
    #[serde(default)]
    pub verify: bool,
    /// Cable override; the board's default interface otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cable: Option<String>,
    /// Overrides the mode-dependent default timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_board() -> String {
    DEFAULT_BOARD.to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            board: default_board(),
            mode: ProgramMode::default(),
            verify: false,
            cable: None,
            timeout_secs: None,
        }
    }
}

/// `[toolchain]` section: tool name to explicit executable path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolchainConfig {
    /// Configured paths keyed by tool name.
    pub paths: BTreeMap<String, PathBuf>,
}

impl ToolchainConfig {
    /// The explicit path configured for `tool`, if any.
    pub fn path(&self, tool: &str) -> Option<&PathBuf> {
        self.paths.get(tool)
    }
}
