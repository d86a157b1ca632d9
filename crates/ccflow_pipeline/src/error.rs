//! Orchestration errors.
//!
//! Everything here is rejected before any process is launched and leaves
//! the project state untouched. Failures of a stage that did start are not
//! errors; they are recorded on the stage.

use crate::executor::PlanError;
use ccflow_config::ConfigError;
use ccflow_diagnostics::{Category, Diagnostic, DiagnosticCode};
use ccflow_hierarchy::HierarchyError;
use ccflow_process::RunError;
use ccflow_state::{CorruptStateError, Stage, StageStatus, StoreError};
use ccflow_toolchain::NotFoundError;
use std::path::PathBuf;

/// Why an orchestration request was refused.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The stage's prerequisite has not succeeded.
    #[error("cannot run {stage}: {missing} has not succeeded (status: {status})")]
    PrerequisiteNotMet {
        /// The requested stage.
        stage: Stage,
        /// The prerequisite that is not `succeeded`.
        missing: Stage,
        /// Its current status.
        status: StageStatus,
    },

    /// Another stage of this project is running.
    #[error("cannot run {requested}: {running} is already running")]
    StageBusy {
        /// The requested stage.
        requested: Stage,
        /// The stage holding the project.
        running: Stage,
    },

    /// The transition table forbids the move.
    #[error("{stage} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The stage.
        stage: Stage,
        /// Current status.
        from: StageStatus,
        /// Requested status.
        to: StageStatus,
    },

    /// The hierarchy is cyclic or the top level is ambiguous.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// The executor could not build a plan.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The project configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The persisted record could not be loaded.
    #[error(transparent)]
    Corrupt(#[from] CorruptStateError),

    /// The persisted record could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A project file operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A path given for removal is not inside a source directory.
    #[error("{} is not inside a source directory of this project", .0.display())]
    NotASource(PathBuf),

    /// A file given as a source has no HDL extension.
    #[error("{} is not a VHDL or Verilog file", .0.display())]
    NotHdl(PathBuf),

    /// Adding a source would overwrite a different file of the same name.
    #[error("{} already exists", .0.display())]
    SourceExists(PathBuf),

    /// A configuration section of the stage's inputs has no JSON form.
    #[error("cannot fingerprint the inputs of {stage}: {source}")]
    Fingerprint {
        /// The stage being started.
        stage: Stage,
        /// The serialization error.
        source: serde_json::Error,
    },

    /// Another handle or process holds the project's run lock and has not
    /// yet recorded which stage it runs.
    #[error(
        "the project is locked by another ccflow process{}",
        pid.map(|p| format!(" (pid {p})")).unwrap_or_default()
    )]
    Locked {
        /// The holder's process id, when it could be read.
        pid: Option<u32>,
    },

    /// A tool needed outside a stage run could not be found.
    #[error(transparent)]
    ToolNotFound(#[from] NotFoundError),

    /// A tool started outside a stage run could not be launched.
    #[error(transparent)]
    Launch(#[from] RunError),

    /// No simulation stage has produced a waveform to open.
    #[error("no waveform available{}", stage.map(|s| format!(" for {s}")).unwrap_or_default())]
    NoWaveform {
        /// The simulation asked for, if one was named.
        stage: Option<Stage>,
    },
}

impl PipelineError {
    fn number(&self) -> u16 {
        match self {
            PipelineError::PrerequisiteNotMet { .. } => 1,
            PipelineError::StageBusy { .. } => 2,
            PipelineError::InvalidTransition { .. } => 3,
            PipelineError::Hierarchy(_) => 4,
            PipelineError::Plan(_) => 5,
            PipelineError::Config(_) => 6,
            PipelineError::Corrupt(_) => 7,
            PipelineError::Store(_) => 8,
            PipelineError::Io { .. } => 9,
            PipelineError::NotASource(_) => 10,
            PipelineError::NotHdl(_) => 11,
            PipelineError::SourceExists(_) => 12,
            PipelineError::Fingerprint { .. } => 13,
            PipelineError::Locked { .. } => 14,
            PipelineError::NoWaveform { .. } => 15,
            PipelineError::ToolNotFound(_) => 16,
            PipelineError::Launch(_) => 17,
        }
    }

    /// The suggested next action, if there is an obvious one.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            PipelineError::PrerequisiteNotMet { missing, .. } => {
                Some(format!("run `ccflow run {missing}` first"))
            }
            PipelineError::StageBusy { running, .. } => {
                Some(format!("wait for {running} to finish or cancel it"))
            }
            PipelineError::Hierarchy(HierarchyError::AmbiguousTopLevel { .. }) => {
                Some("choose one with `ccflow set-top` or `ccflow set-testbench`".to_string())
            }
            PipelineError::Hierarchy(HierarchyError::Cycle(_)) => {
                Some("break the instantiation cycle in the sources".to_string())
            }
            PipelineError::Plan(e) => e.suggestion(),
            PipelineError::NotHdl(_) => {
                Some("source files end in .vhd, .vhdl, .v or .sv".to_string())
            }
            PipelineError::Corrupt(_) => {
                Some("rebuild the record with `ccflow open --reindex`".to_string())
            }
            PipelineError::SourceExists(_) => {
                Some("pass --replace to overwrite it".to_string())
            }
            PipelineError::Locked { .. } => {
                Some("wait for the other ccflow process to finish".to_string())
            }
            PipelineError::ToolNotFound(e) => Some(format!(
                "install {tool} or run `ccflow toolchain set-path {tool} <PATH>`",
                tool = e.tool
            )),
            PipelineError::NoWaveform { stage } => Some(format!(
                "run `ccflow run {}` first",
                stage.unwrap_or(Stage::BehavioralSim)
            )),
            _ => None,
        }
    }

    /// Converts the error into a diagnostic with a help line.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = DiagnosticCode::new(Category::Pipeline, self.number());
        let diag = Diagnostic::error(code, self.to_string());
        match self.suggestion() {
            Some(help) => diag.with_help(help),
            None => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerequisite_message_names_upstream() {
        let err = PipelineError::PrerequisiteNotMet {
            stage: Stage::Implementation,
            missing: Stage::Synthesis,
            status: StageStatus::NotRun,
        };
        assert_eq!(
            err.to_string(),
            "cannot run implementation: synthesis has not succeeded (status: not-run)"
        );
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.to_string(), "P001");
        assert_eq!(diag.help, vec!["run `ccflow run synthesis` first"]);
    }

    #[test]
    fn busy_message() {
        let err = PipelineError::StageBusy {
            requested: Stage::Upload,
            running: Stage::Implementation,
        };
        assert_eq!(
            err.to_string(),
            "cannot run upload: implementation is already running"
        );
    }

    #[test]
    fn lock_message_names_the_holder() {
        assert_eq!(
            PipelineError::Locked { pid: Some(4242) }.to_string(),
            "the project is locked by another ccflow process (pid 4242)"
        );
        let diag = PipelineError::Locked { pid: None }.to_diagnostic();
        assert_eq!(diag.code.to_string(), "P014");
        assert_eq!(
            diag.message,
            "the project is locked by another ccflow process"
        );
    }

    #[test]
    fn existing_source_suggests_replace() {
        let diag = PipelineError::SourceExists(PathBuf::from("src/top.vhd")).to_diagnostic();
        assert_eq!(diag.code.to_string(), "P012");
        assert_eq!(diag.message, "src/top.vhd already exists");
        assert_eq!(diag.help, vec!["pass --replace to overwrite it"]);
    }
}
