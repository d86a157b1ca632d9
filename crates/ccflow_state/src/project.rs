//! The project aggregate.

use crate::record::{FailureReport, StageRecord};
use crate::stage::Stage;
use crate::status::StageStatus;
use ccflow_config::ProjectConfig;
use ccflow_hierarchy::HierarchySnapshot;
use ccflow_source::SourceIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything persisted about one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Absolute project root.
    pub root: PathBuf,
    /// The last source index.
    pub index: SourceIndex,
    /// The hierarchy built from `index`; empty if it had a cycle.
    pub hierarchy: HierarchySnapshot,
    /// One record per stage.
    pub stages: BTreeMap<Stage, StageRecord>,
    /// The configuration the stage fingerprints were computed against.
    pub config: ProjectConfig,
}

impl ProjectState {
    /// A fresh state with every stage `not-run`.
    pub fn new(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        ProjectState {
            root: root.into(),
            index: SourceIndex::default(),
            hierarchy: HierarchySnapshot::default(),
            stages: Stage::ALL
                .into_iter()
                .map(|s| (s, StageRecord::default()))
                .collect(),
            config,
        }
    }

    /// The record for `stage`, inserting a default one if absent.
    pub fn record_mut(&mut self, stage: Stage) -> &mut StageRecord {
        self.stages.entry(stage).or_default()
    }

    /// The status of `stage`; absent records count as `not-run`.
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.stages
            .get(&stage)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    /// The stage currently marked running, if any.
    pub fn running_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|(_, r)| r.status == StageStatus::Running)
            .map(|(s, _)| *s)
    }

    /// Marks stages left `running` by a dead process as failed.
    ///
    /// Returns the stages that were repaired.
    pub fn recover_interrupted(&mut self) -> Vec<Stage> {
        let mut repaired = Vec::new();
        for (stage, record) in self.stages.iter_mut() {
            if record.status == StageStatus::Running {
                record.status = StageStatus::Failed;
                record.failure = Some(FailureReport {
                    cause: "interrupted".to_string(),
                    tail: Vec::new(),
                    suggestion: format!("run {stage} again"),
                });
                record.touch();
                repaired.push(*stage);
            }
        }
        repaired
    }
}
