//! Captured process output.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which pipe a line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One line of output, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    /// Source pipe.
    pub stream: Stream,
    /// Line text without the terminator.
    pub text: String,
}

/// Receives output lines while a process runs.
pub trait OutputObserver: Send + Sync {
    /// Called once per line, in arrival order.
    fn on_line(&self, stream: Stream, line: &str);
}

impl<F> OutputObserver for F
where
    F: Fn(Stream, &str) + Send + Sync,
{
    fn on_line(&self, stream: Stream, line: &str) {
        self(stream, line)
    }
}

/// The result of a process that ran to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, or `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// All output lines, interleaved in arrival order.
    pub lines: Vec<OutputLine>,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

impl ProcessOutcome {
    /// `true` when the exit code is zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Lines from one stream.
    pub fn stream(&self, stream: Stream) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |l| l.stream == stream)
            .map(|l| l.text.as_str())
    }

    /// Standard output joined with newlines.
    pub fn stdout(&self) -> String {
        join_lines(self.stream(Stream::Stdout))
    }

    /// Standard error joined with newlines.
    pub fn stderr(&self) -> String {
        join_lines(self.stream(Stream::Stderr))
    }

    /// The last `n` lines of either stream.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines[skip..].iter().map(|l| l.text.clone()).collect()
    }
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}
