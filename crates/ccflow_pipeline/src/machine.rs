//! The per-stage state machine.
//!
//! Every status change of a [`StageRecord`](ccflow_state::StageRecord) goes
//! through here so the transition table in
//! [`StageStatus::valid_next`] always holds.

use crate::error::PipelineError;
use crate::fingerprint;
use ccflow_common::ContentHash;
use ccflow_state::{FailureReport, ProjectState, Stage, StageManifest, StageStatus};

/// Checks that `stage` may start now.
///
/// Refuses while any stage of the project is running, while the declared
/// prerequisite has not succeeded, and when the table forbids the move.
pub fn check_start(state: &ProjectState, stage: Stage) -> Result<(), PipelineError> {
    if let Some(running) = state.running_stage() {
        return Err(PipelineError::StageBusy {
            requested: stage,
            running,
        });
    }
    if let Some(missing) = stage.prerequisite() {
        let status = state.status(missing);
        if status != StageStatus::Succeeded {
            return Err(PipelineError::PrerequisiteNotMet {
                stage,
                missing,
                status,
            });
        }
    }
    transition_allowed(state, stage, StageStatus::Running)
}

fn transition_allowed(
    state: &ProjectState,
    stage: Stage,
    to: StageStatus,
) -> Result<(), PipelineError> {
    let from = state.status(stage);
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition { stage, from, to })
    }
}

/// Marks `stage` running.
pub fn begin(state: &mut ProjectState, stage: Stage) -> Result<(), PipelineError> {
    check_start(state, stage)?;
    let record = state.record_mut(stage);
    record.status = StageStatus::Running;
    record.failure = None;
    record.touch();
    log::info!("{stage}: running");
    Ok(())
}

/// Records a successful run with the fingerprint its inputs had at start.
pub fn succeed(
    state: &mut ProjectState,
    stage: Stage,
    input: ContentHash,
    manifest: &StageManifest,
) -> Result<(), PipelineError> {
    transition_allowed(state, stage, StageStatus::Succeeded)?;
    let record = state.record_mut(stage);
    record.status = StageStatus::Succeeded;
    record.artifacts = manifest.artifacts.clone();
    record.input_fingerprint = Some(input);
    record.output_fingerprint = Some(manifest.fingerprint());
    record.failure = None;
    record.touch();
    log::info!("{stage}: succeeded");
    Ok(())
}

/// Records a failed run. Artifacts of a failed run are not trusted.
pub fn fail(
    state: &mut ProjectState,
    stage: Stage,
    report: FailureReport,
) -> Result<(), PipelineError> {
    transition_allowed(state, stage, StageStatus::Failed)?;
    log::warn!("{stage}: {}", report.cause);
    let record = state.record_mut(stage);
    record.status = StageStatus::Failed;
    record.artifacts.clear();
    record.input_fingerprint = None;
    record.output_fingerprint = None;
    record.failure = Some(report);
    record.touch();
    Ok(())
}

/// Marks succeeded stages stale when their inputs changed.
///
/// A stage goes stale when its recomputed input fingerprint differs from the
/// one recorded at success or cannot be computed, or when its prerequisite
/// is stale. Upload is the exception to the second rule: it depends only on
/// the bitstream, so it goes stale only once implementation re-runs with
/// different output.
/// Returns the stages that changed, in pipeline order.
pub fn refresh_staleness(state: &mut ProjectState) -> Vec<Stage> {
    let mut newly_stale = Vec::new();
    for stage in Stage::ALL {
        if state.status(stage) != StageStatus::Succeeded {
            continue;
        }
        let recorded = state.stages.get(&stage).and_then(|r| r.input_fingerprint);
        let inputs_changed = match fingerprint::compute(state, stage) {
            Ok(current) => recorded != Some(current),
            Err(e) => {
                log::warn!("{stage}: cannot fingerprint inputs: {e}");
                true
            }
        };
        let upstream_stale = stage != Stage::Upload
            && stage
                .prerequisite()
                .is_some_and(|p| state.status(p) == StageStatus::Stale);
        if inputs_changed || upstream_stale {
            let record = state.record_mut(stage);
            record.status = StageStatus::Stale;
            record.touch();
            log::info!("{stage}: stale");
            newly_stale.push(stage);
        }
    }
    newly_stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccflow_config::ProjectConfig;
    use ccflow_state::Artifact;

    fn state() -> ProjectState {
        ProjectState::new("/p", ProjectConfig::new("p"))
    }

    fn manifest(stage: Stage, content: &[u8]) -> StageManifest {
        StageManifest {
            stage,
            artifacts: vec![Artifact {
                path: format!("{}/out", stage.output_dir()).into(),
                hash: ContentHash::from_bytes(content),
            }],
        }
    }

    fn run_ok(state: &mut ProjectState, stage: Stage, content: &[u8]) {
        begin(state, stage).unwrap();
        let input = fingerprint::compute(state, stage).unwrap();
        succeed(state, stage, input, &manifest(stage, content)).unwrap();
    }

    #[test]
    fn prerequisite_must_have_succeeded() {
        let mut state = state();
        let err = begin(&mut state, Stage::PostSynthSim).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PrerequisiteNotMet {
                missing: Stage::Synthesis,
                status: StageStatus::NotRun,
                ..
            }
        ));
        assert_eq!(state.status(Stage::PostSynthSim), StageStatus::NotRun);
    }

    #[test]
    fn only_one_stage_runs_at_a_time() {
        let mut state = state();
        begin(&mut state, Stage::Synthesis).unwrap();
        assert!(matches!(
            begin(&mut state, Stage::BehavioralSim),
            Err(PipelineError::StageBusy {
                running: Stage::Synthesis,
                ..
            })
        ));
        assert!(matches!(
            begin(&mut state, Stage::Synthesis),
            Err(PipelineError::StageBusy { .. })
        ));
    }

    #[test]
    fn failure_clears_artifacts_and_fingerprints() {
        let mut state = state();
        run_ok(&mut state, Stage::Synthesis, b"netlist");
        begin(&mut state, Stage::Synthesis).unwrap();
        fail(
            &mut state,
            Stage::Synthesis,
            FailureReport {
                cause: "yosys exited with code 1".into(),
                tail: vec!["ERROR: syntax".into()],
                suggestion: "fix it".into(),
            },
        )
        .unwrap();
        let record = &state.stages[&Stage::Synthesis];
        assert_eq!(record.status, StageStatus::Failed);
        assert!(record.artifacts.is_empty());
        assert_eq!(record.output_fingerprint, None);
    }

    #[test]
    fn succeed_requires_running() {
        let mut state = state();
        let input = fingerprint::compute(&state, Stage::Synthesis).unwrap();
        assert!(matches!(
            succeed(&mut state, Stage::Synthesis, input, &manifest(Stage::Synthesis, b"x")),
            Err(PipelineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn config_change_propagates_forward_but_not_to_upload() {
        let mut state = state();
        run_ok(&mut state, Stage::Synthesis, b"netlist");
        run_ok(&mut state, Stage::Implementation, b"bits");
        run_ok(&mut state, Stage::PostSynthSim, b"vcd");
        run_ok(&mut state, Stage::Upload, b"");
        assert!(refresh_staleness(&mut state).is_empty());

        state.config.synthesis.strategy = ccflow_config::SynthesisStrategy::Area;
        assert_eq!(
            refresh_staleness(&mut state),
            vec![Stage::Synthesis, Stage::PostSynthSim, Stage::Implementation]
        );
        assert_eq!(state.status(Stage::Upload), StageStatus::Succeeded);
        assert!(refresh_staleness(&mut state).is_empty());
    }

    #[test]
    fn upload_goes_stale_when_implementation_output_changes() {
        let mut state = state();
        run_ok(&mut state, Stage::Synthesis, b"netlist");
        run_ok(&mut state, Stage::Implementation, b"bits");
        run_ok(&mut state, Stage::Upload, b"");
        run_ok(&mut state, Stage::Implementation, b"other bits");
        assert_eq!(refresh_staleness(&mut state), vec![Stage::Upload]);
    }

    #[test]
    fn stale_stage_can_run_again() {
        let mut state = state();
        run_ok(&mut state, Stage::Synthesis, b"netlist");
        state.config.synthesis.strategy = ccflow_config::SynthesisStrategy::Quality;
        refresh_staleness(&mut state);
        assert_eq!(state.status(Stage::Synthesis), StageStatus::Stale);
        run_ok(&mut state, Stage::Synthesis, b"netlist");
        assert_eq!(state.status(Stage::Synthesis), StageStatus::Succeeded);
    }
}
