//! Input fingerprints per stage.
//!
//! Each stage hashes the source files it reads, the configuration sections
//! that change its command lines, and the output fingerprint of its
//! prerequisite. Timeouts are excluded; they never change a result.
//!
//! Configuration sections are hashed through their JSON form. A section
//! that cannot be serialized fails the fingerprint instead of hashing as
//! empty.

use crate::executor::implementation::select_constraint_file;
use crate::layout::relative_to;
use ccflow_common::{ContentHash, Fingerprinter};
use ccflow_source::SourceFile;
use ccflow_state::{ProjectState, Stage};
use serde::Serialize;

/// The current input fingerprint of `stage`.
pub fn compute(state: &ProjectState, stage: Stage) -> Result<ContentHash, serde_json::Error> {
    let config = &state.config;
    let mut fp = Fingerprinter::new(stage.as_str());
    match stage {
        Stage::BehavioralSim => {
            files(&mut fp, state, |_| true);
            simulation(&mut fp, state)?;
        }
        Stage::Synthesis => {
            files(&mut fp, state, |f| !is_testbench_file(state, f));
            let mut synthesis = config.synthesis.clone();
            synthesis.timeout_secs = None;
            section(&mut fp, "synthesis", &synthesis)?;
        }
        Stage::PostSynthSim | Stage::PostImplSim => {
            files(&mut fp, state, |f| is_testbench_file(state, f));
            simulation(&mut fp, state)?;
            upstream(&mut fp, state, stage);
        }
        Stage::Implementation => {
            let mut implementation = config.implementation.clone();
            implementation.timeout_secs = None;
            section(&mut fp, "implementation", &implementation)?;
            let constraints = select_constraint_file(
                &state.root,
                &config.project.name,
                implementation.constraint_file.as_deref(),
            )
            .ok();
            let hash = constraints
                .as_ref()
                .and_then(|p| ContentHash::from_file(&state.root.join(p)).ok());
            fp.opt_hash("constraints", hash.as_ref());
            upstream(&mut fp, state, stage);
        }
        Stage::Upload => {
            let mut upload = config.upload.clone();
            upload.timeout_secs = None;
            section(&mut fp, "upload", &upload)?;
            section(&mut fp, "board", &config.selected_board().ok())?;
            upstream(&mut fp, state, stage);
        }
    }
    Ok(fp.finish())
}

fn files(fp: &mut Fingerprinter, state: &ProjectState, keep: impl Fn(&SourceFile) -> bool) {
    for file in state.index.files.values().filter(|f| keep(*f)) {
        fp.text("file", &relative_to(&state.root, &file.path).to_string_lossy());
        fp.hash("content", &file.hash);
    }
}

fn simulation(fp: &mut Fingerprinter, state: &ProjectState) -> Result<(), serde_json::Error> {
    let mut sim = state.config.simulation.clone();
    sim.timeout_secs = None;
    sim.profiles.clear();
    section(fp, "simulation", &sim)?;
    section(fp, "stop-time", &state.config.simulation.stop_time_arg().ok())?;
    section(fp, "vhdl", &state.config.synthesis.vhdl_standard)?;
    section(fp, "ieee", &state.config.synthesis.ieee_library)
}

fn upstream(fp: &mut Fingerprinter, state: &ProjectState, stage: Stage) {
    let output = stage
        .prerequisite()
        .and_then(|p| state.stages.get(&p))
        .and_then(|r| r.output_fingerprint);
    fp.opt_hash("upstream", output.as_ref());
}

fn section<T: Serialize>(
    fp: &mut Fingerprinter,
    label: &str,
    value: &T,
) -> Result<(), serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    fp.field(label, &bytes);
    Ok(())
}

/// A file whose declared units are all testbenches.
fn is_testbench_file(state: &ProjectState, file: &SourceFile) -> bool {
    !file.units.is_empty()
        && file
            .units
            .iter()
            .all(|u| state.index.get(u).is_some_and(|unit| unit.is_testbench()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccflow_config::{ProjectConfig, SimProfile, TimeUnit};
    use ccflow_source::{DesignUnit, HdlLanguage, UnitRole};
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};

    fn add(state: &mut ProjectState, name: &str, role: UnitRole, content: &str) {
        let dir = if role == UnitRole::Testbench { "testbench" } else { "src" };
        let path = PathBuf::from(format!("/p/{dir}/{name}.vhd"));
        state.index.files.insert(
            path.clone(),
            SourceFile {
                path: path.clone(),
                language: HdlLanguage::Vhdl,
                hash: ContentHash::from_bytes(content.as_bytes()),
                units: vec![name.to_string()],
            },
        );
        state.index.units.insert(
            name.to_string(),
            DesignUnit {
                name: name.to_string(),
                path,
                line: 1,
                language: HdlLanguage::Vhdl,
                role,
                implementations: vec!["rtl".into()],
                references: BTreeSet::new(),
                body_files: BTreeSet::new(),
            },
        );
    }

    fn project() -> ProjectState {
        let mut state = ProjectState::new("/p", ProjectConfig::new("p"));
        add(&mut state, "top", UnitRole::Design, "entity top");
        add(&mut state, "top_tb", UnitRole::Testbench, "entity top_tb");
        state
    }

    fn all(state: &ProjectState) -> Vec<ContentHash> {
        Stage::ALL
            .iter()
            .map(|s| compute(state, *s).unwrap())
            .collect()
    }

    #[test]
    fn unchanged_inputs_give_identical_fingerprints() {
        assert_eq!(all(&project()), all(&project()));
    }

    #[test]
    fn testbench_edit_leaves_synthesis_alone() {
        let before = project();
        let mut after = project();
        add(&mut after, "top_tb", UnitRole::Testbench, "entity top_tb -- edited");
        assert_eq!(
            compute(&before, Stage::Synthesis).unwrap(),
            compute(&after, Stage::Synthesis).unwrap()
        );
        for stage in [Stage::BehavioralSim, Stage::PostSynthSim, Stage::PostImplSim] {
            assert_ne!(
                compute(&before, stage).unwrap(),
                compute(&after, stage).unwrap(),
                "{stage}"
            );
        }
    }

    #[test]
    fn timeouts_are_ignored_but_settings_are_not() {
        let before = project();
        let mut after = project();
        after.config.synthesis.timeout_secs = Some(10);
        after.config.simulation.timeout_secs = Some(10);
        assert_eq!(all(&before), all(&after));

        after.config.simulation.time_unit = TimeUnit::Us;
        assert_ne!(
            compute(&before, Stage::BehavioralSim).unwrap(),
            compute(&after, Stage::BehavioralSim).unwrap()
        );
        assert_eq!(
            compute(&before, Stage::Synthesis).unwrap(),
            compute(&after, Stage::Synthesis).unwrap()
        );
    }

    #[test]
    fn only_the_selected_profile_counts() {
        let before = project();
        let mut after = project();
        after
            .config
            .simulation
            .create_profile("long", SimProfile::new(50, TimeUnit::Us))
            .unwrap();
        assert_eq!(all(&before), all(&after));

        after.config.simulation.profile = "long".into();
        assert_ne!(
            compute(&before, Stage::BehavioralSim).unwrap(),
            compute(&after, Stage::BehavioralSim).unwrap()
        );
    }

    #[test]
    fn moving_the_project_keeps_fingerprints() {
        let before = project();
        let mut after = ProjectState::new("/moved", ProjectConfig::new("p"));
        for file in before.index.files.values() {
            let path = Path::new("/moved").join(file.path.strip_prefix("/p").unwrap());
            after.index.files.insert(
                path.clone(),
                SourceFile {
                    path,
                    ..file.clone()
                },
            );
        }
        after.index.units = before.index.units.clone();
        assert_eq!(all(&before), all(&after));
    }

    #[test]
    fn upload_follows_board_selection() {
        let before = project();
        let mut after = project();
        after.config.upload.board = "gatemate_evb_spi".into();
        assert_ne!(
            compute(&before, Stage::Upload).unwrap(),
            compute(&after, Stage::Upload).unwrap()
        );
        assert_eq!(
            compute(&before, Stage::Implementation).unwrap(),
            compute(&after, Stage::Implementation).unwrap()
        );
    }

    #[test]
    fn unserializable_section_is_an_error() {
        let mut fp = Fingerprinter::new("synthesis");
        let mut keyed = std::collections::BTreeMap::new();
        keyed.insert((1u8, 2u8), "tuple keys have no JSON form");
        let err = section(&mut fp, "synthesis", &keyed).unwrap_err();
        assert!(err.to_string().contains("key must be a string"), "{err}");
        section(&mut fp, "synthesis", &ProjectConfig::new("p").synthesis).unwrap();
    }
}
