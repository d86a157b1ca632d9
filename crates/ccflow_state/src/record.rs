//! The per-stage record.

use crate::manifest::Artifact;
use crate::status::StageStatus;
use ccflow_common::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the last run of a stage failed, in a form fit for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// One-line cause, e.g. "yosys exited with code 1".
    pub cause: String,
    /// The last lines the tool printed.
    #[serde(default)]
    pub tail: Vec<String>,
    /// Suggested next action.
    pub suggestion: String,
}

/// Status, timing, and outputs of one stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Current status.
    pub status: StageStatus,
    /// When the status last changed.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Files produced by the last successful run.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Fingerprint of the inputs of the last successful run.
    #[serde(default)]
    pub input_fingerprint: Option<ContentHash>,
    /// Fingerprint of the manifest written by the last successful run.
    #[serde(default)]
    pub output_fingerprint: Option<ContentHash>,
    /// Set while the status is `failed`.
    #[serde(default)]
    pub failure: Option<FailureReport>,
}

impl StageRecord {
    /// Stamps the record with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
