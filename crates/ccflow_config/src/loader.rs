//! Configuration file loading, validation, and saving.

use crate::error::ConfigError;
use crate::types::{ProjectConfig, TOOL_NAMES};
use std::path::Path;

/// File name of the project configuration, relative to the project root.
pub const CONFIG_FILE: &str = "ccflow.toml";

/// Loads and validates `ccflow.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Writes `config` to `<project_dir>/ccflow.toml`.
pub fn save_config(project_dir: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    validate_config(config)?;
    let text =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
    let path = project_dir.join(CONFIG_FILE);
    std::fs::write(&path, text).map_err(|source| ConfigError::Io { path, source })?;
    log::debug!("wrote {}", CONFIG_FILE);
    Ok(())
}

/// Checks names that serde cannot: board ids, simulation profiles, tool keys.
pub fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.trim().is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.sources.is_empty() {
        return Err(ConfigError::ValidationError(
            "project.sources must list at least one directory".to_string(),
        ));
    }
    for tool in config.toolchain.paths.keys() {
        if !TOOL_NAMES.contains(&tool.as_str()) {
            return Err(ConfigError::UnknownOption {
                kind: "tool",
                name: tool.clone(),
                valid: TOOL_NAMES.iter().map(|s| s.to_string()).collect(),
            });
        }
    }
    let board = config.selected_board()?;
    if !board.supports(config.upload.mode) {
        return Err(ConfigError::ValidationError(format!(
            "board '{}' does not support {} programming",
            config.upload.board, config.upload.mode
        )));
    }
    for (name, profile) in &config.simulation.profiles {
        crate::types::check_profile(name, profile)?;
    }
    config.simulation.stop_time()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ImplementationStrategy, ProgramMode, SynthesisStrategy, VhdlStandard};

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str("[project]\nname = \"blinky\"\n").unwrap();
        assert_eq!(config.project.name, "blinky");
        assert_eq!(config.synthesis.strategy, SynthesisStrategy::Balanced);
        assert_eq!(config.upload.mode, ProgramMode::Sram);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "blinky"
sources = ["rtl", "tb"]

[synthesis]
strategy = "timing"
vhdl_standard = "VHDL-1993"
ieee_library = "mentor"
top = "blinky_top"

[implementation]
strategy = "congestion"
constraint_file = "constraints/pins.ccf"
timing_analysis = true
timeout_secs = 900

[simulation]
profile = "long"
testbench = "blinky_tb"

[simulation.profiles.long]
duration = 50
unit = "us"

[upload]
board = "lab"
mode = "flash"
verify = true

[toolchain]
ghdl = "/opt/ghdl/bin/ghdl"
p_r = "/opt/cc/p_r"

[boards.lab]
name = "Lab board"
loader_id = "gatemate_evb_jtag"
interfaces = ["jtag"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.sources.len(), 2);
        assert_eq!(config.synthesis.vhdl_standard, VhdlStandard::Vhdl1993);
        assert_eq!(
            config.implementation.strategy,
            ImplementationStrategy::Congestion
        );
        assert_eq!(config.implementation.timeout_secs, Some(900));
        assert_eq!(config.simulation.stop_time_arg().unwrap(), "50us");
        assert_eq!(config.selected_board().unwrap().loader_id, "gatemate_evb_jtag");
        assert_eq!(
            config.toolchain.path("ghdl").unwrap(),
            Path::new("/opt/ghdl/bin/ghdl")
        );
    }

    #[test]
    fn reject_empty_name() {
        let err = load_config_from_str("[project]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "project.name"));
    }

    #[test]
    fn reject_unknown_strategy() {
        let err = load_config_from_str("[project]\nname = \"x\"\n[synthesis]\nstrategy = \"fast\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn reject_unknown_board() {
        let err =
            load_config_from_str("[project]\nname = \"x\"\n[upload]\nboard = \"de10\"\n").unwrap_err();
        let ConfigError::UnknownOption { kind, valid, .. } = err else {
            panic!("expected unknown option");
        };
        assert_eq!(kind, "board");
        assert!(valid.contains(&"olimex_gatemateevb".to_string()));
    }

    #[test]
    fn reject_unknown_tool() {
        let err = load_config_from_str("[project]\nname = \"x\"\n[toolchain]\nvivado = \"/x\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption { kind: "tool", .. }));
    }

    #[test]
    fn reject_unsupported_mode() {
        let toml = r#"
[project]
name = "x"
[upload]
board = "ram_only"
mode = "flash"
[boards.ram_only]
name = "RAM only"
loader_id = "ram_only"
modes = ["sram"]
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::new("counter");
        config.synthesis.top = Some("counter".into());
        config
            .toolchain
            .paths
            .insert("yosys".into(), "/usr/local/bin/yosys".into());
        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn older_presets_table_still_loads() {
        let toml = "[project]\nname = \"x\"\n[simulation]\nprofile = \"slow\"\n[simulation.presets.slow]\nduration = 3\nunit = \"ms\"\n";
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.simulation.stop_time_arg().unwrap(), "3ms");
        let written = toml::to_string_pretty(&config).unwrap();
        assert!(written.contains("[simulation.profiles.slow]"), "{written}");
    }

    #[test]
    fn reject_zero_length_profile() {
        let toml = "[project]\nname = \"x\"\n[simulation.profiles.none]\nduration = 0\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
