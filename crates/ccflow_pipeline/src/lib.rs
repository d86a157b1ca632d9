//! Stage executors, the pipeline state machine, and the project orchestrator.
//!
//! A [`Project`] owns one project's [`ProjectState`](ccflow_state::ProjectState).
//! Running a stage re-indexes the sources, checks the transition table and
//! the stage's prerequisite, asks the stage's executor for a plan of tool
//! invocations, runs them in build order through the process runner, and
//! records the result. Only one stage runs at a time per project.

#![warn(missing_docs)]

pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod layout;
pub mod machine;
pub mod orchestrator;
pub mod schedule;

pub use error::PipelineError;
pub use executor::{
    executor_for, Invocation, PlanError, StageContext, StageExecutor, StagePlan, StageResult,
};
pub use orchestrator::{
    failure_diagnostic, Project, RefreshReport, StageReport, StatusReport, Waveform,
};
pub use schedule::{execute, Execution, InvocationRecord, InvocationStatus};
