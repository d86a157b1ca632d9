//! Stage executors.
//!
//! An executor is pure: [`StageExecutor::plan`] turns the project's index,
//! hierarchy, and configuration into an ordered list of [`Invocation`]s, and
//! [`StageExecutor::interpret`] turns what those invocations did into a
//! [`StageResult`]. Executors never touch the stage record; the
//! orchestrator does.

mod analysis;
pub mod implementation;
pub mod simulation;
pub mod synthesis;
pub mod upload;

use crate::schedule::{InvocationRecord, InvocationStatus};
use ccflow_config::{ConfigError, ProgramMode, ProjectConfig};
use ccflow_hierarchy::{HierarchyError, HierarchyGraph};
use ccflow_process::ProcessOutcome;
use ccflow_source::{HdlLanguage, SourceIndex};
use ccflow_state::{FailureReport, Stage};
use ccflow_toolchain::Tool;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of trailing output lines kept in failure reports.
pub const TAIL_LINES: usize = 12;

/// Read-only inputs to planning.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// Project root; every relative path below is relative to it.
    pub root: &'a Path,
    /// Active configuration.
    pub config: &'a ProjectConfig,
    /// Current source index.
    pub index: &'a SourceIndex,
    /// Current hierarchy.
    pub graph: &'a HierarchyGraph,
}

/// One external program run within a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Short description for logs and failure reports.
    pub label: String,
    /// The tool to run.
    pub tool: Tool,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory relative to the project root.
    pub cwd: PathBuf,
    /// Indices of earlier invocations that must have succeeded first.
    pub depends_on: Vec<usize>,
    /// Wall-clock limit.
    pub timeout: Option<Duration>,
    /// Captures standard output into this file (relative to the root).
    pub stdout_to: Option<PathBuf>,
}

impl Invocation {
    pub(crate) fn new(label: impl Into<String>, tool: Tool) -> Self {
        Invocation {
            label: label.into(),
            tool,
            args: Vec::new(),
            cwd: PathBuf::new(),
            depends_on: Vec::new(),
            timeout: None,
            stdout_to: None,
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn after(mut self, deps: impl IntoIterator<Item = usize>) -> Self {
        self.depends_on.extend(deps);
        self
    }

    pub(crate) fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Everything needed to run one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagePlan {
    /// The stage being planned.
    pub stage: Stage,
    /// The unit the stage is built around (synthesis top or testbench).
    pub top: String,
    /// Invocations in execution order.
    pub invocations: Vec<Invocation>,
    /// Files the stage must produce, relative to the root.
    pub artifacts: Vec<PathBuf>,
    /// Directories to create before running, relative to the root.
    pub dirs: Vec<PathBuf>,
}

impl StagePlan {
    pub(crate) fn new(stage: Stage, top: impl Into<String>) -> Self {
        StagePlan {
            stage,
            top: top.into(),
            invocations: Vec::new(),
            artifacts: Vec::new(),
            dirs: vec![PathBuf::from(stage.output_dir())],
        }
    }

    /// Appends an invocation and returns its index.
    pub(crate) fn push(&mut self, invocation: Invocation) -> usize {
        self.invocations.push(invocation);
        self.invocations.len() - 1
    }

    /// Every tool the plan needs, deduplicated.
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.invocations.iter().map(|i| i.tool).collect();
        tools.sort();
        tools.dedup();
        tools
    }
}

/// The interpreted outcome of a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageResult {
    /// Every invocation succeeded and every artifact exists.
    Succeeded {
        /// Produced files relative to the root.
        artifacts: Vec<PathBuf>,
    },
    /// Something went wrong.
    Failed(FailureReport),
}

/// Why a plan could not be built.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Top-level selection failed.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// The configuration names something unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An upstream artifact the stage reads is missing.
    #[error("required input {} does not exist", path.display())]
    MissingInput {
        /// The missing file, relative to the root.
        path: PathBuf,
        /// What would produce it.
        hint: String,
    },

    /// The configured constraint file does not exist.
    #[error("constraint file {} does not exist", .0.display())]
    ConstraintFileNotFound(PathBuf),

    /// No constraint file was configured or found.
    #[error("no constraint file found in constraints/")]
    NoConstraintFile,

    /// The simulator cannot handle a unit's language.
    #[error("unit `{unit}` is written in {language}, which GHDL cannot simulate")]
    UnsupportedLanguage {
        /// The offending unit.
        unit: String,
        /// Its language.
        language: HdlLanguage,
    },

    /// The selected board cannot be programmed in the requested mode.
    #[error("board '{board}' does not support {mode} programming")]
    UnsupportedMode {
        /// The board id.
        board: String,
        /// The requested mode.
        mode: ProgramMode,
    },
}

impl PlanError {
    /// The suggested next action.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            PlanError::Hierarchy(HierarchyError::AmbiguousTopLevel { .. }) => {
                Some("choose one with `ccflow set-top` or `ccflow set-testbench`".to_string())
            }
            PlanError::MissingInput { hint, .. } => Some(hint.clone()),
            PlanError::ConstraintFileNotFound(_) => {
                Some("fix implementation.constraint_file in ccflow.toml".to_string())
            }
            PlanError::NoConstraintFile => {
                Some("add a .ccf file with pin assignments to constraints/".to_string())
            }
            PlanError::UnsupportedMode { .. } => {
                Some("choose another upload mode or board".to_string())
            }
            _ => None,
        }
    }
}

/// A stage's planning and output conventions.
pub trait StageExecutor: Send + Sync {
    /// The stage this executor implements.
    fn stage(&self) -> Stage;

    /// Builds the invocation sequence.
    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PlanError>;

    /// Applies the tool's success conventions to one finished invocation.
    ///
    /// The default treats a non-zero exit as failure.
    fn classify(&self, _invocation: &Invocation, outcome: &ProcessOutcome) -> Result<(), String> {
        match outcome.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(format!("exited with code {code}")),
            None => Err("terminated by a signal".to_string()),
        }
    }

    /// What to try after a tool reported failure.
    fn suggestion(&self) -> String;

    /// Turns per-invocation records into the stage result.
    fn interpret(
        &self,
        plan: &StagePlan,
        records: &[InvocationRecord],
        root: &Path,
    ) -> StageResult {
        let stage = self.stage();
        for record in records {
            let invocation = &plan.invocations[record.id];
            match &record.status {
                InvocationStatus::Succeeded | InvocationStatus::Skipped { .. } => {}
                InvocationStatus::NotStarted => {
                    return StageResult::Failed(FailureReport {
                        cause: format!("{stage} cancelled before {}", invocation.label),
                        tail: Vec::new(),
                        suggestion: format!("run {stage} again"),
                    })
                }
                InvocationStatus::Cancelled => {
                    return StageResult::Failed(FailureReport {
                        cause: format!("{stage} cancelled during {}", invocation.label),
                        tail: record.tail.clone(),
                        suggestion: format!("run {stage} again"),
                    })
                }
                InvocationStatus::TimedOut(after) => {
                    return StageResult::Failed(FailureReport {
                        cause: format!(
                            "{}: {} timed out after {}s",
                            invocation.label,
                            invocation.tool,
                            after.as_secs()
                        ),
                        tail: record.tail.clone(),
                        suggestion: "raise the stage's timeout_secs in ccflow.toml".to_string(),
                    })
                }
                InvocationStatus::LaunchFailed(reason) => {
                    return StageResult::Failed(FailureReport {
                        cause: format!("{stage} failed: {reason}"),
                        tail: Vec::new(),
                        suggestion: format!(
                            "check the configured tool path with `ccflow toolchain set-path {} <PATH>`",
                            invocation.tool
                        ),
                    })
                }
                InvocationStatus::Failed(reason) => {
                    return StageResult::Failed(FailureReport {
                        cause: format!("{} ({}) {reason}", invocation.label, invocation.tool),
                        tail: record.tail.clone(),
                        suggestion: self.suggestion(),
                    })
                }
            }
        }
        if let Some(skipped) = records
            .iter()
            .find(|r| matches!(r.status, InvocationStatus::Skipped { .. }))
        {
            return StageResult::Failed(FailureReport {
                cause: format!("{} was skipped", plan.invocations[skipped.id].label),
                tail: Vec::new(),
                suggestion: self.suggestion(),
            });
        }
        if let Some(missing) = plan.artifacts.iter().find(|a| !root.join(a).is_file()) {
            return StageResult::Failed(FailureReport {
                cause: format!("{stage} did not produce {}", missing.display()),
                tail: records.last().map(|r| r.tail.clone()).unwrap_or_default(),
                suggestion: self.suggestion(),
            });
        }
        StageResult::Succeeded {
            artifacts: plan.artifacts.clone(),
        }
    }
}

/// The executor for `stage`.
pub fn executor_for(stage: Stage) -> Box<dyn StageExecutor> {
    match stage {
        Stage::BehavioralSim => Box::new(simulation::SimulationExecutor::behavioral()),
        Stage::Synthesis => Box::new(synthesis::SynthesisExecutor),
        Stage::PostSynthSim => Box::new(simulation::SimulationExecutor::post_synthesis()),
        Stage::Implementation => Box::new(implementation::ImplementationExecutor),
        Stage::PostImplSim => Box::new(simulation::SimulationExecutor::post_implementation()),
        Stage::Upload => Box::new(upload::UploadExecutor),
    }
}

fn timeout_secs(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use ccflow_common::ContentHash;
    use ccflow_source::{DesignUnit, SourceFile, UnitRole};
    use std::collections::BTreeSet;

    /// An index of VHDL units rooted at `/proj`, one file per unit under
    /// `src/` or `testbench/`.
    pub fn index(units: &[(&str, &[&str])]) -> SourceIndex {
        let mut index = SourceIndex::default();
        for (name, refs) in units {
            let role = UnitRole::classify(name, Path::new(""));
            let dir = if role == UnitRole::Testbench { "testbench" } else { "src" };
            let path = PathBuf::from(format!("/proj/{dir}/{name}.vhd"));
            index.files.insert(
                path.clone(),
                SourceFile {
                    path: path.clone(),
                    language: HdlLanguage::Vhdl,
                    hash: ContentHash::from_bytes(name.as_bytes()),
                    units: vec![name.to_string()],
                },
            );
            index.units.insert(
                name.to_string(),
                DesignUnit {
                    name: name.to_string(),
                    path,
                    line: 1,
                    language: HdlLanguage::Vhdl,
                    role,
                    implementations: vec!["rtl".into()],
                    references: refs.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
                    body_files: BTreeSet::new(),
                },
            );
        }
        index
    }

    pub fn graph(index: &SourceIndex) -> HierarchyGraph {
        HierarchyGraph::build(&index.units).unwrap()
    }

    pub fn ctx<'a>(
        config: &'a ProjectConfig,
        index: &'a SourceIndex,
        graph: &'a HierarchyGraph,
    ) -> StageContext<'a> {
        StageContext {
            root: Path::new("/proj"),
            config,
            index,
            graph,
        }
    }
}
