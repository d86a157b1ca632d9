//! Running a stage plan through the process runner.
//!
//! Invocations run one at a time in plan order, which is build order. An
//! invocation whose dependency did not succeed is skipped, so a failure
//! stops its own branch while unrelated branches keep going. Cancellation
//! stops everything.

use crate::executor::{Invocation, StageExecutor, StagePlan, TAIL_LINES};
use ccflow_process::{
    CancelSignal, OutputObserver, ProcessOutcome, ProcessSpec, RunError, Runner, Stream,
};
use ccflow_toolchain::Tool;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// What happened to one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationStatus {
    /// Ran and passed the executor's checks.
    Succeeded,
    /// Ran and failed the executor's checks.
    Failed(String),
    /// Killed at its deadline.
    TimedOut(Duration),
    /// The program could not be started.
    LaunchFailed(String),
    /// Killed on request.
    Cancelled,
    /// Not run because a dependency did not succeed.
    Skipped {
        /// The first dependency that did not succeed.
        blocked_by: usize,
    },
    /// Not run because the stage was cancelled first.
    NotStarted,
}

/// The record of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRecord {
    /// Index into the plan.
    pub id: usize,
    /// Final status.
    pub status: InvocationStatus,
    /// The last output lines.
    pub tail: Vec<String>,
    /// Full outcome, when the process ran to exit.
    pub outcome: Option<ProcessOutcome>,
}

impl InvocationRecord {
    fn without_run(id: usize, status: InvocationStatus) -> Self {
        InvocationRecord {
            id,
            status,
            tail: Vec::new(),
            outcome: None,
        }
    }

    /// `true` if a process was actually started.
    pub fn launched(&self) -> bool {
        !matches!(
            self.status,
            InvocationStatus::LaunchFailed(_)
                | InvocationStatus::Skipped { .. }
                | InvocationStatus::NotStarted
        )
    }
}

/// Forwards lines and remembers the last few.
struct TailObserver<'a> {
    inner: &'a dyn OutputObserver,
    tail: Mutex<VecDeque<String>>,
}

impl<'a> TailObserver<'a> {
    fn new(inner: &'a dyn OutputObserver) -> Self {
        TailObserver {
            inner,
            tail: Mutex::new(VecDeque::with_capacity(TAIL_LINES)),
        }
    }

    fn take(self) -> Vec<String> {
        self.tail
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .into()
    }
}

impl OutputObserver for TailObserver<'_> {
    fn on_line(&self, stream: Stream, line: &str) {
        self.inner.on_line(stream, line);
        let mut tail = self.tail.lock().unwrap_or_else(|e| e.into_inner());
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
}

/// Everything [`execute`] needs besides the plan.
pub struct Execution<'a> {
    /// Project root; invocation paths are relative to it.
    pub root: &'a Path,
    /// Resolved executable for every tool the plan uses.
    pub tools: &'a BTreeMap<Tool, PathBuf>,
    /// The process runner.
    pub runner: &'a Runner,
    /// Receives every output line.
    pub observer: &'a dyn OutputObserver,
    /// Stops the run when signalled.
    pub cancel: &'a CancelSignal,
}

/// Runs `plan` and returns one record per invocation, in plan order.
pub async fn execute(
    plan: &StagePlan,
    executor: &dyn StageExecutor,
    env: &Execution<'_>,
) -> Vec<InvocationRecord> {
    let mut records: Vec<InvocationRecord> = Vec::with_capacity(plan.invocations.len());
    let mut cancelled = false;
    for (id, invocation) in plan.invocations.iter().enumerate() {
        if cancelled || env.cancel.is_cancelled() {
            cancelled = true;
            records.push(InvocationRecord::without_run(id, InvocationStatus::NotStarted));
            continue;
        }
        let blocked = invocation
            .depends_on
            .iter()
            .copied()
            .find(|dep| {
                records.get(*dep).map(|r| &r.status) != Some(&InvocationStatus::Succeeded)
            });
        if let Some(blocked_by) = blocked {
            log::info!("skipping {}: depends on a failed step", invocation.label);
            records.push(InvocationRecord::without_run(
                id,
                InvocationStatus::Skipped { blocked_by },
            ));
            continue;
        }
        let record = run_one(id, invocation, executor, env).await;
        cancelled = record.status == InvocationStatus::Cancelled;
        records.push(record);
    }
    records
}

async fn run_one(
    id: usize,
    invocation: &Invocation,
    executor: &dyn StageExecutor,
    env: &Execution<'_>,
) -> InvocationRecord {
    let Some(program) = env.tools.get(&invocation.tool) else {
        return InvocationRecord::without_run(
            id,
            InvocationStatus::LaunchFailed(format!("{} was not resolved", invocation.tool)),
        );
    };
    let spec = ProcessSpec::new(program, env.root.join(&invocation.cwd))
        .args(invocation.args.iter().cloned())
        .timeout(invocation.timeout);
    log::info!("{}", invocation.label);

    let observer = TailObserver::new(env.observer);
    let result = env.runner.run(&spec, &observer, env.cancel).await;
    let tail = observer.take();
    let (status, outcome) = match result {
        Ok(outcome) => {
            let status = match executor.classify(invocation, &outcome) {
                Ok(()) => capture_stdout(env.root, invocation, &outcome),
                Err(reason) => InvocationStatus::Failed(reason),
            };
            (status, Some(outcome))
        }
        Err(RunError::Cancelled) => (InvocationStatus::Cancelled, None),
        Err(RunError::TimedOut(after)) => (InvocationStatus::TimedOut(after), None),
        Err(e @ RunError::LaunchFailed { .. }) => {
            (InvocationStatus::LaunchFailed(e.to_string()), None)
        }
        Err(RunError::Io(e)) => (InvocationStatus::Failed(format!("i/o error: {e}")), None),
    };
    if let InvocationStatus::Failed(reason) = &status {
        log::warn!("{} failed: {reason}", invocation.label);
    }
    InvocationRecord {
        id,
        status,
        tail,
        outcome,
    }
}

fn capture_stdout(
    root: &Path,
    invocation: &Invocation,
    outcome: &ProcessOutcome,
) -> InvocationStatus {
    let Some(path) = &invocation.stdout_to else {
        return InvocationStatus::Succeeded;
    };
    let full = root.join(path);
    let written = full
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(&full, outcome.stdout()));
    match written {
        Ok(()) => InvocationStatus::Succeeded,
        Err(e) => InvocationStatus::Failed(format!("cannot write {}: {e}", path.display())),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::{PlanError, StageContext};
    use ccflow_process::CancelHandle;
    use ccflow_state::Stage;

    struct Shell;

    impl StageExecutor for Shell {
        fn stage(&self) -> Stage {
            Stage::Synthesis
        }

        fn plan(&self, _ctx: &StageContext<'_>) -> Result<StagePlan, PlanError> {
            unreachable!()
        }

        fn suggestion(&self) -> String {
            String::new()
        }
    }

    fn sh(label: &str, script: &str, deps: &[usize]) -> Invocation {
        Invocation::new(label, Tool::Ghdl)
            .args(["-c", script])
            .after(deps.iter().copied())
    }

    fn tools() -> BTreeMap<Tool, PathBuf> {
        BTreeMap::from([(Tool::Ghdl, PathBuf::from("/bin/sh"))])
    }

    async fn run(
        plan: &StagePlan,
        root: &Path,
        cancel: &CancelSignal,
        observer: &dyn OutputObserver,
    ) -> Vec<InvocationRecord> {
        let tools = tools();
        let runner = Runner::with_grace(Duration::from_millis(200));
        let env = Execution {
            root,
            tools: &tools,
            runner: &runner,
            observer,
            cancel,
        };
        execute(plan, &Shell, &env).await
    }

    fn quiet(_: Stream, _: &str) {}

    fn statuses(records: &[InvocationRecord]) -> Vec<InvocationStatus> {
        records.iter().map(|r| r.status.clone()).collect()
    }

    #[tokio::test]
    async fn failure_skips_only_its_own_branch() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = StagePlan::new(Stage::Synthesis, "top");
        plan.push(sh("leaf a", "echo broken; exit 3", &[]));
        plan.push(sh("parent of a", "echo unreachable", &[0]));
        plan.push(sh("leaf b", "echo fine", &[]));
        plan.push(sh("parent of b", "echo fine", &[2]));
        let records = run(&plan, dir.path(), &CancelSignal::never(), &quiet).await;
        assert_eq!(
            statuses(&records),
            vec![
                InvocationStatus::Failed("exited with code 3".into()),
                InvocationStatus::Skipped { blocked_by: 0 },
                InvocationStatus::Succeeded,
                InvocationStatus::Succeeded,
            ]
        );
        assert_eq!(records[0].tail, vec!["broken"]);
        assert!(!records[1].launched());
    }

    #[tokio::test]
    async fn stdout_is_captured_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = StagePlan::new(Stage::Synthesis, "top");
        let mut export = sh("export", "echo 'entity top is'; echo 'end;'", &[]);
        export.stdout_to = Some(PathBuf::from("sim/post-synthesis/top_synth.vhd"));
        plan.push(export);
        let records = run(&plan, dir.path(), &CancelSignal::never(), &quiet).await;
        assert_eq!(records[0].status, InvocationStatus::Succeeded);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sim/post-synthesis/top_synth.vhd")).unwrap(),
            "entity top is\nend;\n"
        );
    }

    #[tokio::test]
    async fn cancellation_stops_remaining_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = StagePlan::new(Stage::Synthesis, "top");
        plan.push(sh("long", "echo started; sleep 10", &[]));
        plan.push(sh("independent", "echo never", &[]));
        let handle = CancelHandle::new();
        let signal = handle.signal();
        let observer = move |_: Stream, line: &str| {
            if line == "started" {
                handle.cancel();
            }
        };
        let records = run(&plan, dir.path(), &signal, &observer).await;
        assert_eq!(
            statuses(&records),
            vec![InvocationStatus::Cancelled, InvocationStatus::NotStarted]
        );
    }

    #[tokio::test]
    async fn timeout_fails_only_that_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = StagePlan::new(Stage::Synthesis, "top");
        plan.push(sh("slow", "sleep 10", &[]).timeout(Some(Duration::from_millis(200))));
        plan.push(sh("other", "true", &[]));
        let records = run(&plan, dir.path(), &CancelSignal::never(), &quiet).await;
        assert_eq!(
            records[0].status,
            InvocationStatus::TimedOut(Duration::from_millis(200))
        );
        assert_eq!(records[1].status, InvocationStatus::Succeeded);
    }

    #[tokio::test]
    async fn unresolved_tool_is_a_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = StagePlan::new(Stage::Synthesis, "top");
        plan.push(Invocation::new("route", Tool::PlaceRoute));
        let records = run(&plan, dir.path(), &CancelSignal::never(), &quiet).await;
        assert!(matches!(records[0].status, InvocationStatus::LaunchFailed(_)));
    }
}
