//! Per-stage status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one stage's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    /// Never run in this project.
    #[default]
    NotRun,
    /// A run is in progress.
    Running,
    /// The last run succeeded and its inputs are unchanged.
    Succeeded,
    /// The last run failed or was cancelled.
    Failed,
    /// The last run succeeded but an input has changed since.
    Stale,
}

impl StageStatus {
    /// The persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::NotRun => "not-run",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
            StageStatus::Stale => "stale",
        }
    }

    /// Statuses reachable from this one in a single step.
    pub fn valid_next(self) -> &'static [StageStatus] {
        match self {
            StageStatus::NotRun => &[StageStatus::Running],
            StageStatus::Running => &[StageStatus::Succeeded, StageStatus::Failed],
            StageStatus::Succeeded => &[StageStatus::Stale, StageStatus::Running],
            StageStatus::Failed => &[StageStatus::Running],
            StageStatus::Stale => &[StageStatus::Running],
        }
    }

    /// Checks a single transition against the table.
    pub fn can_transition_to(self, next: StageStatus) -> bool {
        self.valid_next().contains(&next)
    }

    /// Whether downstream stages may consume this stage's output.
    pub fn is_usable(self) -> bool {
        self == StageStatus::Succeeded
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StageStatus; 5] = [
        StageStatus::NotRun,
        StageStatus::Running,
        StageStatus::Succeeded,
        StageStatus::Failed,
        StageStatus::Stale,
    ];

    #[test]
    fn only_running_reaches_terminal_states() {
        for from in ALL {
            let reaches = from.can_transition_to(StageStatus::Succeeded)
                || from.can_transition_to(StageStatus::Failed);
            assert_eq!(reaches, from == StageStatus::Running, "{from}");
        }
    }

    #[test]
    fn only_succeeded_goes_stale() {
        for from in ALL {
            assert_eq!(
                from.can_transition_to(StageStatus::Stale),
                from == StageStatus::Succeeded,
                "{from}"
            );
        }
    }

    #[test]
    fn running_cannot_restart() {
        assert!(!StageStatus::Running.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Stale.can_transition_to(StageStatus::Running));
        assert!(StageStatus::NotRun.can_transition_to(StageStatus::Running));
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&StageStatus::NotRun).unwrap();
        assert_eq!(json, "\"not-run\"");
    }
}
