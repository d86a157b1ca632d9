//! Upload: programs the bitstream with openFPGALoader.

use super::implementation::bitstream_path;
use super::{timeout_secs, Invocation, PlanError, StageContext, StageExecutor, StagePlan};
use ccflow_config::ProgramMode;
use ccflow_hierarchy::TopTarget;
use ccflow_state::Stage;
use ccflow_toolchain::Tool;
use std::time::Duration;

/// Default time allowed for an SRAM load.
pub const SRAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time allowed for a flash write.
pub const FLASH_TIMEOUT: Duration = Duration::from_secs(120);

/// Plans and interprets the upload stage.
pub struct UploadExecutor;

impl StageExecutor for UploadExecutor {
    fn stage(&self) -> Stage {
        Stage::Upload
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PlanError> {
        let upload = &ctx.config.upload;
        let top = ctx
            .graph
            .select_top(TopTarget::Synthesis, ctx.config.synthesis.top.as_deref())?;
        let bitstream = bitstream_path(&top);
        if !ctx.root.join(&bitstream).is_file() {
            return Err(PlanError::MissingInput {
                path: bitstream,
                hint: "run implementation first".to_string(),
            });
        }
        let board = ctx.config.selected_board()?;
        if !board.supports(upload.mode) {
            return Err(PlanError::UnsupportedMode {
                board: upload.board.clone(),
                mode: upload.mode,
            });
        }
        let (flag, default_timeout) = match upload.mode {
            ProgramMode::Sram => ("-m", SRAM_TIMEOUT),
            ProgramMode::Flash => ("-f", FLASH_TIMEOUT),
        };

        let mut load = Invocation::new(
            format!("program {} ({})", board.loader_id, upload.mode),
            Tool::OpenFpgaLoader,
        )
        .args(["-b", board.loader_id.as_str()]);
        if let Some(cable) = board.cable(upload.cable.as_deref()) {
            load = load.args(["--cable", cable]);
        }
        load = load.arg(flag);
        if upload.verify {
            load = load.arg("--verify");
        }
        load = load
            .arg(bitstream.display().to_string())
            .timeout(Some(timeout_secs(upload.timeout_secs).unwrap_or(default_timeout)));

        let mut plan = StagePlan::new(Stage::Upload, top);
        plan.push(load);
        Ok(plan)
    }

    fn suggestion(&self) -> String {
        "check that the board is connected and powered, and the cable setting".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::{graph, index};
    use ccflow_config::ProjectConfig;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("impl/bitstream")).unwrap();
        std::fs::write(dir.path().join("impl/bitstream/top.bit"), b"bits").unwrap();
        dir
    }

    #[test]
    fn flash_upload_with_verify_and_board_cable() {
        let dir = project();
        let index = index(&[("top", &[])]);
        let graph = graph(&index);
        let mut config = ProjectConfig::new("p");
        config.upload.board = "gatemate_evb_jtag".into();
        config.upload.mode = ProgramMode::Flash;
        config.upload.verify = true;
        let ctx = StageContext {
            root: dir.path(),
            config: &config,
            index: &index,
            graph: &graph,
        };
        let plan = UploadExecutor.plan(&ctx).unwrap();
        assert_eq!(plan.invocations.len(), 1);
        let load = &plan.invocations[0];
        assert_eq!(
            load.args,
            vec![
                "-b",
                "gatemate_evb_jtag",
                "--cable",
                "jtag",
                "-f",
                "--verify",
                "impl/bitstream/top.bit"
            ]
        );
        assert_eq!(load.timeout, Some(FLASH_TIMEOUT));
        assert!(plan.artifacts.is_empty());
    }

    #[test]
    fn auto_cable_is_omitted() {
        let dir = project();
        let index = index(&[("top", &[])]);
        let graph = graph(&index);
        let config = ProjectConfig::new("p");
        let ctx = StageContext {
            root: dir.path(),
            config: &config,
            index: &index,
            graph: &graph,
        };
        let plan = UploadExecutor.plan(&ctx).unwrap();
        assert_eq!(
            plan.invocations[0].args,
            vec!["-b", "olimex_gatemateevb", "-m", "impl/bitstream/top.bit"]
        );
        assert_eq!(plan.invocations[0].timeout, Some(SRAM_TIMEOUT));
    }

    #[test]
    fn unsupported_mode_is_a_plan_error() {
        let dir = project();
        let index = index(&[("top", &[])]);
        let graph = graph(&index);
        let mut config = ProjectConfig::new("p");
        let mut board = config.selected_board().unwrap();
        board.modes = vec![ProgramMode::Sram];
        config.boards.insert("sram_only".into(), board);
        config.upload.board = "sram_only".into();
        config.upload.mode = ProgramMode::Flash;
        let ctx = StageContext {
            root: dir.path(),
            config: &config,
            index: &index,
            graph: &graph,
        };
        assert!(matches!(
            UploadExecutor.plan(&ctx),
            Err(PlanError::UnsupportedMode { .. })
        ));
    }
}
