//! `ccflow configure`: shows or edits `ccflow.toml`.
//!
//! Assignments use dotted keys (`implementation.timing_analysis=true`).
//! Values are read as TOML where they parse and as strings otherwise, and
//! the whole edit is validated before anything is written.

use ccflow_config::{validate_config, ProjectConfig};
use toml::{Table, Value};

use crate::project::{self, print_refresh};
use crate::GlobalArgs;

/// Runs the `ccflow configure` command.
pub fn run(assignments: &[String], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    if assignments.is_empty() {
        print!("{}", toml::to_string_pretty(&project.config())?);
        return Ok(0);
    }
    let updated = apply(&project.config(), assignments)?;
    let report = project.update_config(|config| *config = updated)?;
    if !global.quiet {
        for assignment in assignments {
            eprintln!("         Set {assignment}");
        }
    }
    print_refresh(&report, global);
    Ok(0)
}

/// Applies `key=value` assignments to a copy of `config`.
pub fn apply(
    config: &ProjectConfig,
    assignments: &[String],
) -> Result<ProjectConfig, Box<dyn std::error::Error>> {
    let mut root = Value::try_from(config)?;
    for assignment in assignments {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected `section.key=value`, got `{assignment}`"))?;
        let path: Vec<&str> = key.trim().split('.').collect();
        if path.len() < 2 || path.iter().any(|p| p.is_empty()) {
            return Err(format!("expected `section.key=value`, got `{assignment}`").into());
        }
        set(&mut root, &path, parse_value(raw.trim()))?;
    }

    let updated: ProjectConfig = root.try_into()?;
    let check = Value::try_from(&updated)?;
    for assignment in assignments {
        let (key, raw) = assignment.split_once('=').unwrap_or((assignment, ""));
        let path: Vec<&str> = key.trim().split('.').collect();
        if !raw.trim().is_empty() && lookup(&check, &path).is_none() {
            return Err(format!("unknown setting `{}`", key.trim()).into());
        }
    }
    validate_config(&updated)?;
    Ok(updated)
}

fn parse_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn set(root: &mut Value, path: &[&str], value: Value) -> Result<(), String> {
    let (last, parents) = path
        .split_last()
        .ok_or_else(|| "empty setting name".to_string())?;
    let mut table = root
        .as_table_mut()
        .ok_or_else(|| "configuration is not a table".to_string())?;
    for part in parents {
        table = table
            .entry(part.to_string())
            .or_insert(Value::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| format!("`{part}` is not a section"))?;
    }
    table.insert(last.to_string(), value);
    Ok(())
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, part| value.get(*part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccflow_config::{ProgramMode, SynthesisStrategy};
    use std::path::PathBuf;

    fn set_all(items: &[&str]) -> Result<ProjectConfig, Box<dyn std::error::Error>> {
        let assignments: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        apply(&ProjectConfig::new("blinky"), &assignments)
    }

    #[test]
    fn sets_enum_bool_and_integer() {
        let config = set_all(&[
            "synthesis.strategy=area",
            "implementation.timing_analysis=true",
            "synthesis.timeout_secs=600",
        ])
        .unwrap();
        assert_eq!(config.synthesis.strategy, SynthesisStrategy::Area);
        assert!(config.implementation.timing_analysis);
        assert_eq!(config.synthesis.timeout_secs, Some(600));
    }

    #[test]
    fn bare_words_are_strings() {
        let config = set_all(&["synthesis.top=blinky", "toolchain.yosys=/opt/cc/bin/yosys"]).unwrap();
        assert_eq!(config.synthesis.top.as_deref(), Some("blinky"));
        assert_eq!(
            config.toolchain.path("yosys"),
            Some(&PathBuf::from("/opt/cc/bin/yosys"))
        );
        assert_eq!(config.upload.mode, ProgramMode::Sram);
    }

    #[test]
    fn rejects_bad_values_and_unknown_keys() {
        assert!(set_all(&["synthesis.strategy=fastest"]).is_err());
        assert!(set_all(&["upload.board=no_such_board"]).is_err());
        assert!(set_all(&["synthesis.colour=blue"]).is_err());
        assert!(set_all(&["strategy=area"]).is_err());
        assert!(set_all(&["synthesis.strategy"]).is_err());
    }
}
