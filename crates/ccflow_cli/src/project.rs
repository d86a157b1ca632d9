//! Locating and opening the project a command works on.

use std::path::{Path, PathBuf};

use ccflow_config::{UserSettings, CONFIG_FILE};
use ccflow_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use ccflow_hierarchy::HierarchyError;
use ccflow_pipeline::{PipelineError, Project, RefreshReport};
use ccflow_state::CorruptStateError;

use crate::logging;
use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `ccflow.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolves the project root from the global flags.
///
/// `--config` wins (a file means its directory). Otherwise the nearest
/// `ccflow.toml` above the current directory, then the last project opened.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(config) = &global.config {
        let path = PathBuf::from(config);
        let dir = if path.is_file() {
            path.parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            path
        };
        if !dir.join(CONFIG_FILE).is_file() {
            return Err(format!("no {CONFIG_FILE} in {}", dir.display()).into());
        }
        return Ok(dir);
    }
    let cwd = std::env::current_dir()?;
    if let Some(root) = find_project_root(&cwd) {
        return Ok(root);
    }
    let last = UserSettings::default_dir()
        .and_then(|dir| UserSettings::load(&dir).ok())
        .and_then(|settings| settings.last_project)
        .filter(|root| root.join(CONFIG_FILE).is_file());
    match last {
        Some(root) => {
            log::info!("using last project {}", root.display());
            Ok(root)
        }
        None => Err(format!(
            "could not find {CONFIG_FILE} in {} or any parent directory (run `ccflow init`)",
            cwd.display()
        )
        .into()),
    }
}

/// Opens the project for a command.
///
/// A project without a record yet is indexed from scratch.
pub fn open(global: &GlobalArgs, reindex: bool) -> Result<Project, Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    if let Err(e) = logging::attach(&root) {
        log::warn!("cannot write {}: {e}", logging::LOG_FILE);
    }
    let project = if reindex {
        Project::rebuild(&root)?
    } else {
        match Project::open(&root) {
            Err(PipelineError::Corrupt(CorruptStateError::Missing(_))) => {
                log::info!("no project record yet; indexing sources");
                Project::rebuild(&root)?
            }
            other => other?,
        }
    };
    remember(project.root());
    Ok(project)
}

/// Records `root` as the last project opened. Failures are only logged.
pub fn remember(root: &Path) {
    let Some(dir) = UserSettings::default_dir() else {
        return;
    };
    let mut settings = UserSettings::load(&dir).unwrap_or_default();
    if let Err(e) = settings.remember(&dir, root) {
        log::debug!("cannot save user settings: {e}");
    }
}

/// Runs `ccflow open`.
pub fn run_open(reindex: bool, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = open(global, reindex)?;
    let report = project.last_refresh();
    let status = project.status();
    if !global.quiet {
        eprintln!(
            "     Opened {} ({} files, {} units)",
            status.name, status.files, status.units
        );
    }
    print_refresh(&report, global);
    Ok(0)
}

/// Prints what a re-index found: warnings, black boxes, a cycle, and
/// stages that went stale.
pub fn print_refresh(report: &RefreshReport, global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    if let Some(cycle) = &report.cycle {
        let err = PipelineError::Hierarchy(HierarchyError::Cycle(cycle.clone()));
        eprint!("{}", renderer.render(&err.to_diagnostic()));
    }
    if global.quiet {
        return;
    }
    let changes = &report.changes;
    if !changes.is_empty() {
        eprintln!(
            "    Indexed {} new, {} modified, {} deleted",
            changes.new_files.len(),
            changes.modified_files.len(),
            changes.deleted_files.len()
        );
    }
    for warning in &report.warnings {
        eprint!("{}", renderer.render(&warning.to_diagnostic()));
    }
    for reference in &report.unresolved {
        eprint!("{}", renderer.render(&reference.to_diagnostic()));
    }
    for stage in &report.newly_stale {
        eprintln!("      Stale {stage}");
    }
}
