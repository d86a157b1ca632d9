//! `ccflow status`.

use std::fmt::Write as _;

use ccflow_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use ccflow_hierarchy::HierarchyError;
use ccflow_pipeline::{failure_diagnostic, PipelineError, StatusReport};
use ccflow_state::{StageRecord, StageStatus};
use chrono::Local;

use crate::project;
use crate::GlobalArgs;

/// Runs the `ccflow status` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    let status = project.status();
    print!("{}", render(&status));

    let renderer = TerminalRenderer::new(global.color);
    for (stage, record) in &status.stages {
        if let (StageStatus::Failed, Some(failure)) = (record.status, &record.failure) {
            eprint!("{}", renderer.render(&failure_diagnostic(*stage, failure)));
        }
    }
    if let Some(cycle) = &status.cycle {
        let err = PipelineError::Hierarchy(HierarchyError::Cycle(cycle.clone()));
        eprint!("{}", renderer.render(&err.to_diagnostic()));
    }
    if !global.quiet {
        for warning in &status.warnings {
            eprint!("{}", renderer.render(&warning.to_diagnostic()));
        }
        for reference in &status.unresolved {
            eprint!("{}", renderer.render(&reference.to_diagnostic()));
        }
    }
    Ok(0)
}

/// The report as printed on stdout.
fn render(status: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "project  {} ({})", status.name, status.root.display());
    let _ = writeln!(out, "sources  {} files, {} units", status.files, status.units);
    let _ = writeln!(out, "top      {}", describe_top(&status.synthesis_top));
    let _ = writeln!(out, "sim top  {}", describe_top(&status.simulation_top));
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<16} {:<10} {:<20} artifacts", "stage", "status", "updated");
    for (stage, record) in &status.stages {
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:<20} {}",
            stage.as_str(),
            record.status.as_str(),
            updated(record),
            record.artifacts.len()
        );
    }
    if let Some(tree) = &status.tree {
        let _ = writeln!(out);
        out.push_str(tree);
        if !tree.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn describe_top(top: &Result<String, HierarchyError>) -> String {
    match top {
        Ok(name) => name.clone(),
        Err(e) => format!("none ({e})"),
    }
}

fn updated(record: &StageRecord) -> String {
    record
        .updated_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccflow_pipeline::Project;

    #[test]
    fn renders_tops_and_stage_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/blinky.vhd"),
            "entity blinky is end entity;\narchitecture rtl of blinky is begin end architecture;\n",
        )
        .unwrap();
        let project = Project::create(dir.path(), "blinky").unwrap();
        let text = render(&project.status());
        assert!(text.contains("top      blinky"), "{text}");
        assert!(text.contains("sim top  none ("), "{text}");
        assert!(text.contains("synthesis"), "{text}");
        assert!(text.contains("not-run"), "{text}");
        assert_eq!(text.lines().filter(|l| l.contains("not-run")).count(), 6);
    }
}
