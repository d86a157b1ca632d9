//! Synthesis: GHDL analysis followed by one Yosys run.

use super::analysis::{analysis_order, classify_ghdl, ghdl_flags, push_analysis, workdir_flag};
use super::{timeout_secs, Invocation, PlanError, StageContext, StageExecutor, StagePlan};
use crate::layout::relative_to;
use ccflow_hierarchy::TopTarget;
use ccflow_process::ProcessOutcome;
use ccflow_source::HdlLanguage;
use ccflow_state::Stage;
use ccflow_toolchain::Tool;
use std::path::{Path, PathBuf};

/// GHDL library directory used by synthesis and post-synthesis simulation.
pub const WORK_DIR: &str = "synth/work";

/// Path of the Verilog netlist for `top`.
pub fn netlist_path(top: &str) -> PathBuf {
    PathBuf::from(format!("synth/{top}_synth.v"))
}

/// Path of the JSON netlist for `top`.
pub fn json_path(top: &str) -> PathBuf {
    PathBuf::from(format!("synth/{top}_synth.json"))
}

/// Plans and interprets the synthesis stage.
pub struct SynthesisExecutor;

impl StageExecutor for SynthesisExecutor {
    fn stage(&self) -> Stage {
        Stage::Synthesis
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PlanError> {
        let config = &ctx.config.synthesis;
        let top = ctx
            .graph
            .select_top(TopTarget::Synthesis, config.top.as_deref())?;
        let units = ctx.graph.closure(&top);
        let timeout = timeout_secs(config.timeout_secs);
        let workdir = Path::new(WORK_DIR);

        let mut plan = StagePlan::new(Stage::Synthesis, top.clone());
        plan.dirs.push(workdir.to_path_buf());
        let files = analysis_order(ctx, &units);
        let analyses = push_analysis(&mut plan, ctx.config, &files, workdir, timeout);

        let mut script = Vec::new();
        for root in vhdl_roots(ctx, &units, &top) {
            let [std, ieee] = ghdl_flags(ctx.config);
            script.push(format!("ghdl {std} {ieee} {} -e {root}", workdir_flag(workdir)));
        }
        for name in &units {
            let Some(unit) = ctx.index.get(name) else {
                continue;
            };
            let path = relative_to(ctx.root, &unit.path);
            match unit.language {
                HdlLanguage::Verilog => script.push(format!("read_verilog {}", path.display())),
                HdlLanguage::SystemVerilog => {
                    script.push(format!("read_verilog -sv {}", path.display()))
                }
                HdlLanguage::Vhdl => {}
            }
        }
        let netlist = netlist_path(&top);
        let json = json_path(&top);
        script.push(format!(
            "synth_gatemate -top {top} -vlog {}",
            netlist.display()
        ));
        script.extend(config.strategy.passes().iter().map(|p| p.to_string()));
        script.push(format!("write_json {}", json.display()));

        plan.push(
            Invocation::new(format!("synthesize {top}"), Tool::Yosys)
                .args(["-m", "ghdl", "-p"])
                .arg(script.join("; "))
                .after(analyses)
                .timeout(timeout),
        );
        plan.artifacts = vec![netlist, json];
        Ok(plan)
    }

    fn classify(&self, invocation: &Invocation, outcome: &ProcessOutcome) -> Result<(), String> {
        match invocation.tool {
            Tool::Ghdl => classify_ghdl(outcome),
            _ => {
                if let Some(line) = outcome.lines.iter().find(|l| l.text.starts_with("ERROR:")) {
                    return Err(format!("reported: {}", line.text.trim()));
                }
                match outcome.exit_code {
                    Some(0) => Ok(()),
                    Some(code) => Err(format!("exited with code {code}")),
                    None => Err("terminated by a signal".to_string()),
                }
            }
        }
    }

    fn suggestion(&self) -> String {
        "check the synthesis log above and the configured yosys and ghdl paths".to_string()
    }
}

/// VHDL units Yosys must elaborate through the GHDL plugin: the top itself
/// when it is VHDL, otherwise every VHDL unit a Verilog unit instantiates.
fn vhdl_roots(ctx: &StageContext<'_>, units: &[String], top: &str) -> Vec<String> {
    let is_vhdl = |name: &str| {
        ctx.index
            .get(name)
            .is_some_and(|u| u.language == HdlLanguage::Vhdl)
    };
    if is_vhdl(top) {
        return vec![top.to_string()];
    }
    units
        .iter()
        .filter(|name| is_vhdl(name.as_str()))
        .filter(|name| {
            ctx.graph
                .dependents(name.as_str())
                .iter()
                .any(|p| !is_vhdl(p.as_str()))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::{ctx, graph, index};
    use ccflow_config::{ProjectConfig, SynthesisStrategy};
    use ccflow_hierarchy::HierarchyError;
    use ccflow_process::{OutputLine, Stream};
    use std::time::Duration;

    #[test]
    fn plan_analyzes_then_synthesizes() {
        let index = index(&[("top", &["counter"]), ("counter", &[]), ("top_tb", &["top"])]);
        let graph = graph(&index);
        let mut config = ProjectConfig::new("p");
        config.synthesis.strategy = SynthesisStrategy::Speed;
        let plan = SynthesisExecutor.plan(&ctx(&config, &index, &graph)).unwrap();

        assert_eq!(plan.top, "top");
        assert_eq!(plan.invocations.len(), 3);
        assert_eq!(plan.invocations[0].label, "analyze src/counter.vhd");
        assert_eq!(plan.invocations[1].label, "analyze src/top.vhd");
        let yosys = &plan.invocations[2];
        assert_eq!(yosys.tool, Tool::Yosys);
        assert_eq!(yosys.depends_on, vec![0, 1]);
        assert_eq!(
            yosys.args[3],
            "ghdl --std=08 --ieee=synopsys --workdir=synth/work -e top; \
             synth_gatemate -top top -vlog synth/top_synth.v; \
             abc -fast; opt; clean; write_json synth/top_synth.json"
        );
        assert_eq!(
            plan.artifacts,
            vec![
                PathBuf::from("synth/top_synth.v"),
                PathBuf::from("synth/top_synth.json")
            ]
        );
        assert_eq!(plan.tools(), vec![Tool::Ghdl, Tool::Yosys]);
    }

    #[test]
    fn several_roots_need_an_explicit_top() {
        let index = index(&[("a", &[]), ("b", &[])]);
        let graph = graph(&index);
        let mut config = ProjectConfig::new("p");
        let err = SynthesisExecutor
            .plan(&ctx(&config, &index, &graph))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::Hierarchy(HierarchyError::AmbiguousTopLevel { .. })
        ));
        config.synthesis.top = Some("b".into());
        let plan = SynthesisExecutor.plan(&ctx(&config, &index, &graph)).unwrap();
        assert_eq!(plan.top, "b");
    }

    #[test]
    fn yosys_error_lines_fail_and_warnings_do_not() {
        let yosys = Invocation::new("synthesize top", Tool::Yosys);
        let mut outcome = ProcessOutcome {
            exit_code: Some(0),
            lines: vec![OutputLine {
                stream: Stream::Stdout,
                text: "Warning: wire 'x' is assigned in a block".into(),
            }],
            elapsed: Duration::ZERO,
        };
        assert!(SynthesisExecutor.classify(&yosys, &outcome).is_ok());
        outcome.lines.push(OutputLine {
            stream: Stream::Stdout,
            text: "ERROR: Module `foo' not found!".into(),
        });
        assert_eq!(
            SynthesisExecutor.classify(&yosys, &outcome).unwrap_err(),
            "reported: ERROR: Module `foo' not found!"
        );
    }
}
