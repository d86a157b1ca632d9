//! The three GHDL simulations.
//!
//! All of them analyze into a library under the stage directory, elaborate
//! the testbench, and run it with a VCD dump and a stop time. They differ in
//! what stands in for the design: the sources themselves (behavioral), the
//! GHDL-synthesized netlist (post-synthesis), or the netlist written by place
//! and route (post-implementation).

use super::analysis::{
    analysis_order, classify_ghdl, ghdl_flags, push_analysis, workdir_flag, AnalysisFile,
};
use super::implementation::impl_netlist_path;
use super::synthesis::WORK_DIR as SYNTH_WORK_DIR;
use super::{timeout_secs, Invocation, PlanError, StageContext, StageExecutor, StagePlan};
use ccflow_hierarchy::TopTarget;
use ccflow_process::ProcessOutcome;
use ccflow_source::HdlLanguage;
use ccflow_state::Stage;
use ccflow_toolchain::Tool;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Plans and interprets one simulation stage.
pub struct SimulationExecutor {
    stage: Stage,
}

impl SimulationExecutor {
    /// Simulation of the sources.
    pub fn behavioral() -> Self {
        SimulationExecutor {
            stage: Stage::BehavioralSim,
        }
    }

    /// Simulation of the synthesized netlist.
    pub fn post_synthesis() -> Self {
        SimulationExecutor {
            stage: Stage::PostSynthSim,
        }
    }

    /// Simulation of the placed and routed netlist.
    pub fn post_implementation() -> Self {
        SimulationExecutor {
            stage: Stage::PostImplSim,
        }
    }

    fn stage_dir(&self) -> PathBuf {
        PathBuf::from(self.stage.output_dir())
    }
}

/// Path of the netlist GHDL writes for post-synthesis simulation.
pub fn post_synth_netlist_path(top: &str) -> PathBuf {
    PathBuf::from(format!("sim/post-synthesis/{top}_synth.vhd"))
}

impl StageExecutor for SimulationExecutor {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PlanError> {
        let sim = &ctx.config.simulation;
        let testbench = ctx
            .graph
            .select_top(TopTarget::Simulation, sim.testbench.as_deref())?;
        let stop_time = sim.stop_time_arg()?;
        let timeout = timeout_secs(sim.timeout_secs);
        let dir = self.stage_dir();
        let workdir = dir.join("work");
        let tb_units = ctx.graph.closure(&testbench);

        let mut plan = StagePlan::new(self.stage, testbench.clone());
        plan.dirs.push(workdir.clone());

        let analyses = match self.stage {
            Stage::BehavioralSim => {
                require_vhdl(ctx, &tb_units)?;
                let files = analysis_order(ctx, &tb_units);
                push_analysis(&mut plan, ctx.config, &files, &workdir, timeout)
            }
            _ => {
                let top = ctx.graph.select_top(
                    TopTarget::Synthesis,
                    ctx.config.synthesis.top.as_deref(),
                )?;
                let design: BTreeSet<String> = ctx.graph.closure(&top).into_iter().collect();
                let bench: Vec<String> = tb_units
                    .iter()
                    .filter(|u| !design.contains(*u))
                    .cloned()
                    .collect();
                require_vhdl(ctx, &bench)?;

                let netlist = if self.stage == Stage::PostSynthSim {
                    if !ctx.root.join(SYNTH_WORK_DIR).is_dir() {
                        return Err(PlanError::MissingInput {
                            path: PathBuf::from(SYNTH_WORK_DIR),
                            hint: "run synthesis first".to_string(),
                        });
                    }
                    let out = post_synth_netlist_path(&top);
                    let mut export = Invocation::new(format!("export netlist {top}"), Tool::Ghdl)
                        .arg("synth")
                        .args(ghdl_flags(ctx.config))
                        .arg(workdir_flag(Path::new(SYNTH_WORK_DIR)))
                        .arg("--out=vhdl")
                        .arg(top.as_str())
                        .timeout(timeout);
                    export.stdout_to = Some(out.clone());
                    plan.push(export);
                    out
                } else {
                    let out = impl_netlist_path(&top);
                    if !ctx.root.join(&out).is_file() {
                        return Err(PlanError::MissingInput {
                            path: out,
                            hint: "enable implementation.write_netlist and run implementation"
                                .to_string(),
                        });
                    }
                    out
                };

                let offset = plan.invocations.len();
                let mut files = vec![AnalysisFile {
                    path: netlist,
                    depends_on: Vec::new(),
                }];
                for mut file in analysis_order(ctx, &bench) {
                    file.depends_on = std::iter::once(0)
                        .chain(file.depends_on.iter().map(|d| d + 1))
                        .collect();
                    files.push(file);
                }
                let ids = push_analysis(&mut plan, ctx.config, &files, &workdir, timeout);
                if offset > 0 {
                    plan.invocations[ids[0]].depends_on.push(offset - 1);
                }
                ids
            }
        };

        let [std, ieee] = ghdl_flags(ctx.config);
        let elaborate = plan.push(
            Invocation::new(format!("elaborate {testbench}"), Tool::Ghdl)
                .arg("-e")
                .args([std.clone(), ieee.clone()])
                .arg(workdir_flag(&workdir))
                .arg(testbench.as_str())
                .after(analyses)
                .timeout(timeout),
        );
        let vcd = dir.join(format!("{testbench}.vcd"));
        plan.push(
            Invocation::new(format!("simulate {testbench}"), Tool::Ghdl)
                .arg("-r")
                .args([std, ieee])
                .arg(workdir_flag(&workdir))
                .arg(testbench.as_str())
                .arg(format!("--vcd={}", vcd.display()))
                .arg(format!("--stop-time={stop_time}"))
                .after([elaborate])
                .timeout(timeout),
        );
        plan.artifacts.push(vcd);
        Ok(plan)
    }

    fn classify(&self, _invocation: &Invocation, outcome: &ProcessOutcome) -> Result<(), String> {
        classify_ghdl(outcome)
    }

    fn suggestion(&self) -> String {
        match self.stage {
            Stage::BehavioralSim => {
                "check the testbench assertions and the GHDL output above".to_string()
            }
            _ => format!(
                "compare with behavioral-sim; {} may expose a synthesis mismatch",
                self.stage
            ),
        }
    }
}

fn require_vhdl(ctx: &StageContext<'_>, units: &[String]) -> Result<(), PlanError> {
    for name in units {
        if let Some(unit) = ctx.index.get(name) {
            if unit.language != HdlLanguage::Vhdl {
                return Err(PlanError::UnsupportedLanguage {
                    unit: name.clone(),
                    language: unit.language,
                });
            }
        }
    }
    Ok(())
}
