//! End-to-end stage runs against stand-in tools.

#![cfg(unix)]

use std::collections::BTreeSet;
use std::time::Duration;

use ccflow_conformance::{quiet, Fixture, BLINKY_TB_VHD, BLINKY_VHD, FAILING_TOOL, FAKE_TOOL};
use ccflow_pipeline::{PipelineError, Project};
use ccflow_process::OutputObserver;
use ccflow_state::{Stage, StageStatus};
use ccflow_toolchain::Tool;

fn statuses(project: &Project) -> Vec<(Stage, StageStatus)> {
    project
        .state()
        .stages
        .iter()
        .map(|(stage, record)| (*stage, record.status))
        .collect()
}

fn with_status(project: &Project, status: StageStatus) -> BTreeSet<Stage> {
    statuses(project)
        .into_iter()
        .filter(|(_, s)| *s == status)
        .map(|(stage, _)| stage)
        .collect()
}

async fn run_all(project: &Project, stages: &[Stage]) {
    let observer: &dyn OutputObserver = &quiet;
    for &stage in stages {
        let report = project.run_stage(stage, observer).await.unwrap();
        assert!(report.succeeded(), "{stage}: {:?}", report.failure);
    }
}

#[tokio::test]
async fn full_pipeline_succeeds_in_order() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &Stage::ALL).await;

    assert_eq!(
        with_status(&fx.project, StageStatus::Succeeded),
        Stage::ALL.into_iter().collect::<BTreeSet<_>>()
    );
    let root = fx.root();
    for produced in [
        "sim/behavioral/blinky_tb.vcd",
        "synth/blinky_synth.v",
        "synth/blinky_synth.json",
        "impl/bitstream/blinky.bit",
        "sim/post-implementation/blinky_tb.vcd",
    ] {
        assert!(root.join(produced).is_file(), "{produced} missing");
    }
    for stage in Stage::ALL {
        assert!(
            root.join(stage.output_dir()).join("manifest.json").is_file(),
            "{stage} manifest missing"
        );
    }
    let state = fx.project.state();
    let synthesis = &state.stages[&Stage::Synthesis];
    assert!(synthesis.input_fingerprint.is_some());
    assert!(synthesis.output_fingerprint.is_some());
    assert_eq!(synthesis.artifacts.len(), 2);
}

#[tokio::test]
async fn prerequisites_are_never_run_implicitly() {
    let fx = Fixture::blinky();
    let observer: &dyn OutputObserver = &quiet;
    let before = statuses(&fx.project);

    let err = fx
        .project
        .run_stage(Stage::PostSynthSim, observer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::PrerequisiteNotMet {
            stage: Stage::PostSynthSim,
            missing: Stage::Synthesis,
            status: StageStatus::NotRun,
        }
    ));
    let err = fx
        .project
        .run_stage(Stage::Upload, observer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::PrerequisiteNotMet {
            missing: Stage::Implementation,
            ..
        }
    ));
    assert_eq!(statuses(&fx.project), before);
    assert!(!fx.root().join("synth/blinky_synth.json").exists());
}

#[tokio::test]
async fn rerun_with_unchanged_inputs_keeps_outputs() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &[Stage::Synthesis, Stage::Implementation]).await;
    let first = fx.project.state().stages[&Stage::Synthesis].clone();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let observer: &dyn OutputObserver = &quiet;
    let report = fx
        .project
        .run_stage(Stage::Synthesis, observer)
        .await
        .unwrap();
    assert!(report.succeeded());
    assert!(report.newly_stale.is_empty());

    let second = fx.project.state().stages[&Stage::Synthesis].clone();
    assert_eq!(second.status, StageStatus::Succeeded);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.artifacts, first.artifacts);
    assert_eq!(second.input_fingerprint, first.input_fingerprint);
    assert_eq!(second.output_fingerprint, first.output_fingerprint);
    assert_eq!(
        fx.project.state().status(Stage::Implementation),
        StageStatus::Succeeded
    );
}

#[tokio::test]
async fn source_edits_only_grow_the_stale_set() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &Stage::ALL).await;
    assert!(with_status(&fx.project, StageStatus::Stale).is_empty());

    fx.write("testbench/blinky_tb.vhd", &format!("{BLINKY_TB_VHD}-- longer run\n"));
    let report = fx.project.refresh().unwrap();
    let after_tb = with_status(&fx.project, StageStatus::Stale);
    assert_eq!(
        after_tb,
        [Stage::BehavioralSim, Stage::PostSynthSim, Stage::PostImplSim]
            .into_iter()
            .collect::<BTreeSet<_>>()
    );
    assert_eq!(report.newly_stale.len(), 3);

    fx.write("src/blinky.vhd", &format!("{BLINKY_VHD}-- retimed\n"));
    fx.project.refresh().unwrap();
    let after_design = with_status(&fx.project, StageStatus::Stale);
    assert!(after_design.is_superset(&after_tb));
    assert_eq!(
        after_design,
        [
            Stage::BehavioralSim,
            Stage::Synthesis,
            Stage::PostSynthSim,
            Stage::Implementation,
            Stage::PostImplSim,
        ]
        .into_iter()
        .collect::<BTreeSet<_>>()
    );
    assert_eq!(
        with_status(&fx.project, StageStatus::Succeeded),
        [Stage::Upload].into_iter().collect::<BTreeSet<_>>()
    );

    // Refreshing again with nothing changed leaves the set alone.
    let report = fx.project.refresh().unwrap();
    assert!(report.newly_stale.is_empty());
    assert_eq!(with_status(&fx.project, StageStatus::Stale), after_design);
}

#[tokio::test]
async fn configuration_change_invalidates_downstream() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &[Stage::Synthesis, Stage::Implementation]).await;
    let report = fx
        .project
        .update_config(|config| config.synthesis.timeout_secs = Some(900))
        .unwrap();
    assert!(report.newly_stale.is_empty());

    let report = fx
        .project
        .update_config(|config| {
            config.synthesis.strategy = ccflow_config::SynthesisStrategy::Area
        })
        .unwrap();
    assert_eq!(report.newly_stale, vec![Stage::Synthesis, Stage::Implementation]);
}

#[tokio::test]
async fn tool_failure_is_recorded_with_its_output() {
    let fx = Fixture::blinky();
    fx.install(Tool::Yosys, FAILING_TOOL);
    let observer: &dyn OutputObserver = &quiet;

    let report = fx
        .project
        .run_stage(Stage::Synthesis, observer)
        .await
        .unwrap();
    assert_eq!(report.status, StageStatus::Failed);
    let failure = report.failure.clone().unwrap();
    assert!(failure.cause.contains("ERROR: fake failure in yosys"), "{}", failure.cause);
    assert!(failure
        .tail
        .iter()
        .any(|l| l == "ERROR: fake failure in yosys"));
    assert!(!failure.suggestion.is_empty());
    let diagnostic = report.to_diagnostic().unwrap();
    assert!(diagnostic.message.starts_with("synthesis failed"));

    let err = fx
        .project
        .run_stage(Stage::Implementation, observer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::PrerequisiteNotMet {
            status: StageStatus::Failed,
            ..
        }
    ));

    fx.install(Tool::Yosys, FAKE_TOOL);
    run_all(&fx.project, &[Stage::Synthesis]).await;
    assert!(fx.project.state().stages[&Stage::Synthesis].failure.is_none());
}

#[tokio::test]
async fn missing_tool_fails_only_its_stage() {
    let fx = Fixture::blinky();
    std::fs::remove_file(fx.tools.path().join(Tool::OpenFpgaLoader.name())).unwrap();
    fx.project.registry().invalidate(Tool::OpenFpgaLoader);
    run_all(&fx.project, &[Stage::Synthesis, Stage::Implementation]).await;

    let observer: &dyn OutputObserver = &quiet;
    let report = fx.project.run_stage(Stage::Upload, observer).await.unwrap();
    assert_eq!(report.status, StageStatus::Failed);
    let failure = report.failure.unwrap();
    assert!(failure.cause.contains("openFPGALoader"), "{}", failure.cause);
    assert!(failure.suggestion.contains("toolchain set-path"));
    assert_eq!(
        fx.project.state().status(Stage::Implementation),
        StageStatus::Succeeded
    );
}

#[tokio::test]
async fn state_survives_save_and_reload() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &[Stage::BehavioralSim, Stage::Synthesis]).await;
    fx.project
        .update_config(|config| config.implementation.timing_analysis = true)
        .unwrap();

    let saved = fx.project.state();
    let loaded = ccflow_state::load(&ccflow_state::state_path(fx.root())).unwrap();
    assert_eq!(loaded, saved);

    let reopened = fx.reopen().unwrap();
    assert_eq!(reopened.state(), saved);
    assert!(reopened.config().implementation.timing_analysis);
    assert!(reopened.last_refresh().changes.is_empty());
}

#[tokio::test]
async fn deleted_record_is_rebuilt_from_sources() {
    let fx = Fixture::blinky();
    run_all(&fx.project, &[Stage::Synthesis]).await;
    std::fs::remove_file(ccflow_state::state_path(fx.root())).unwrap();

    assert!(matches!(
        fx.reopen(),
        Err(PipelineError::Corrupt(_))
    ));
    let rebuilt = Project::rebuild(fx.root()).unwrap();
    assert_eq!(rebuilt.state().status(Stage::Synthesis), StageStatus::NotRun);
    assert_eq!(rebuilt.status().units, 3);
    assert!(fx.root().join("synth/blinky_synth.json").is_file());
}
