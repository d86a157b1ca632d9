//! The process runner.

use crate::cancel::CancelSignal;
use crate::error::RunError;
use crate::outcome::{OutputLine, OutputObserver, ProcessOutcome, Stream};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// How long a terminated process gets to exit before it is killed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// How long output is still read after the process exits. A background
/// child that inherited the pipes can keep them open indefinitely.
const DRAIN_AFTER_EXIT: Duration = Duration::from_millis(200);

/// What to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable path.
    pub program: PathBuf,
    /// Arguments, not including the program.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Wall-clock limit; `None` runs indefinitely.
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    /// A spec with no arguments and no timeout.
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        ProcessSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            timeout: None,
        }
    }

    /// Appends arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line for display and logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Runs external programs one at a time.
#[derive(Clone, Debug)]
pub struct Runner {
    grace: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Runner {
            grace: DEFAULT_GRACE,
        }
    }
}

impl Runner {
    /// A runner with the default grace period.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the grace period between SIGTERM and SIGKILL.
    pub fn with_grace(grace: Duration) -> Self {
        Runner { grace }
    }

    /// Runs `spec` to completion, forwarding each output line to `observer`.
    ///
    /// Returns `Err(Cancelled)` or `Err(TimedOut)` only after the process
    /// has been confirmed dead. A non-zero exit is still `Ok`.
    pub async fn run(
        &self,
        spec: &ProcessSpec,
        observer: &dyn OutputObserver,
        cancel: &CancelSignal,
    ) -> Result<ProcessOutcome, RunError> {
        log::info!("$ {}", spec.display());
        let start = Instant::now();
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::LaunchFailed {
                program: spec.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = async {
            match spec.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let drain = tokio::time::sleep(DRAIN_AFTER_EXIT);
        tokio::pin!(drain);
        let mut exited: Option<ExitStatus> = None;
        let mut cancel = cancel.clone();
        let name = program_name(&spec.program);
        let mut lines = Vec::new();

        let status = loop {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => {
                    match line {
                        Ok(Some(text)) => record(&mut lines, observer, &name, Stream::Stdout, text),
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            log::warn!("{name}: stdout read error: {e}");
                            stdout_open = false;
                        }
                    }
                }
                line = stderr_lines.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(text)) => record(&mut lines, observer, &name, Stream::Stderr, text),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            log::warn!("{name}: stderr read error: {e}");
                            stderr_open = false;
                        }
                    }
                }
                status = child.wait(), if exited.is_none() => {
                    exited = Some(status?);
                    drain
                        .as_mut()
                        .reset(tokio::time::Instant::now() + DRAIN_AFTER_EXIT);
                }
                _ = &mut drain, if exited.is_some() && (stdout_open || stderr_open) => {
                    log::debug!("{name}: output still open after exit, no longer reading it");
                    stdout_open = false;
                    stderr_open = false;
                }
                _ = cancel.cancelled(), if exited.is_none() => {
                    log::info!("{name}: cancellation requested");
                    self.terminate(&mut child, &name).await;
                    return Err(RunError::Cancelled);
                }
                _ = &mut deadline, if exited.is_none() => {
                    log::warn!("{name}: timed out");
                    self.terminate(&mut child, &name).await;
                    return Err(RunError::TimedOut(spec.timeout.unwrap_or_default()));
                }
            }
            if let Some(status) = exited {
                if !stdout_open && !stderr_open {
                    break status;
                }
            }
        };

        let elapsed = start.elapsed();
        log::debug!("{name}: exited with {status} after {elapsed:.1?}");
        Ok(ProcessOutcome {
            exit_code: status.code(),
            lines,
            elapsed,
        })
    }

    /// Starts `spec` without waiting for it or reading its output, for
    /// interactive programs that outlive the command that opened them.
    /// Returns the process id.
    pub fn launch_detached(&self, spec: &ProcessSpec) -> Result<u32, RunError> {
        log::info!("$ {} &", spec.display());
        let child = std::process::Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RunError::LaunchFailed {
                program: spec.program.clone(),
                source,
            })?;
        Ok(child.id())
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child, name: &str) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
                match kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    Ok(()) => {
                        if tokio::time::timeout(self.grace, child.wait()).await.is_ok() {
                            return;
                        }
                        log::warn!("{name}: still running after {:?}, killing", self.grace);
                    }
                    Err(e) => log::debug!("{name}: SIGTERM failed: {e}"),
                }
            }
        }
        if let Err(e) = child.start_kill() {
            log::debug!("{name}: kill failed: {e}");
        }
        if let Err(e) = child.wait().await {
            log::warn!("{name}: wait after kill failed: {e}");
        }
    }
}

fn record(
    lines: &mut Vec<OutputLine>,
    observer: &dyn OutputObserver,
    name: &str,
    stream: Stream,
    text: String,
) {
    log::debug!("{name}: {text}");
    observer.on_line(stream, &text);
    lines.push(OutputLine { stream, text });
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
