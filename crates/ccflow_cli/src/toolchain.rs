//! `ccflow toolchain check` and `ccflow toolchain set-path`.

use ccflow_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use ccflow_toolchain::{NotFoundError, Registry, ResolutionMode, Tool, ToolchainEntry};

use crate::project;
use crate::{GlobalArgs, ToolchainCommand};

/// Runs a `ccflow toolchain` subcommand.
pub fn run(
    command: &ToolchainCommand,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    match command {
        ToolchainCommand::Check => check(global),
        ToolchainCommand::SetPath { tool, path } => {
            let project = project::open(global, false)?;
            project.set_tool_path(*tool, path.clone())?;
            let result = project.registry().resolve(*tool);
            print_entry(*tool, &result);
            match result {
                Ok(_) => Ok(0),
                Err(e) => {
                    let renderer = TerminalRenderer::new(global.color);
                    eprint!("{}", renderer.render(&e.to_diagnostic()));
                    Ok(1)
                }
            }
        }
    }
}

/// Resolves every tool. Outside a project only `PATH` is searched.
fn check(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let results = match project::resolve_project_root(global) {
        Ok(_) => project::open(global, false)?.registry().check_all(),
        Err(e) => {
            log::debug!("{e}");
            Registry::new().check_all()
        }
    };
    for (tool, result) in &results {
        print_entry(*tool, result);
    }
    let missing: Vec<_> = results
        .iter()
        .filter(|(tool, result)| result.is_err() && is_required(*tool))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }
    let renderer = TerminalRenderer::new(global.color);
    for (_, result) in missing {
        if let Err(e) = result {
            eprint!("{}", renderer.render(&e.to_diagnostic()));
        }
    }
    Ok(1)
}

/// The waveform viewer is optional; every other tool runs in some stage.
fn is_required(tool: Tool) -> bool {
    tool != Tool::Gtkwave
}

fn print_entry(tool: Tool, result: &Result<ToolchainEntry, NotFoundError>) {
    println!("{}", describe(tool, result));
}

fn describe(tool: Tool, result: &Result<ToolchainEntry, NotFoundError>) -> String {
    match result {
        Ok(entry) => {
            let mode = match entry.mode {
                ResolutionMode::SearchPath => "PATH",
                ResolutionMode::ExplicitPath => "configured",
            };
            format!("{:<15} {:<10} {}", tool.name(), mode, entry.path.display())
        }
        Err(e) => format!("{:<15} {:<10} {}", tool.name(), "missing", e.reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn describes_found_and_missing_tools() {
        let found = Ok(ToolchainEntry {
            tool: Tool::Yosys,
            mode: ResolutionMode::ExplicitPath,
            path: PathBuf::from("/opt/cc-toolchain/bin/yosys"),
            verified: false,
        });
        let line = describe(Tool::Yosys, &found);
        assert!(line.starts_with("yosys"));
        assert!(line.contains("configured"));
        assert!(line.ends_with("/opt/cc-toolchain/bin/yosys"));

        let missing = Err(NotFoundError {
            tool: Tool::Ghdl,
            configured: None,
            reason: "not on PATH".into(),
        });
        let line = describe(Tool::Ghdl, &missing);
        assert!(line.contains("missing"));
        assert!(line.ends_with("not on PATH"));
    }

    #[test]
    fn gtkwave_is_optional() {
        assert!(!is_required(Tool::Gtkwave));
        assert!(Tool::ALL.iter().filter(|t| is_required(**t)).count() == 4);
    }
}
