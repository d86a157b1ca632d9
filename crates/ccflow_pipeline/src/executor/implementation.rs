//! Implementation: place and route, bitstream, timing, and netlist export.

use super::synthesis::{json_path, netlist_path};
use super::{timeout_secs, Invocation, PlanError, StageContext, StageExecutor, StagePlan};
use crate::layout::{relative_to, CONSTRAINTS_DIR};
use ccflow_process::ProcessOutcome;
use ccflow_state::Stage;
use ccflow_toolchain::Tool;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Place and route gets five minutes unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const PIN_DIRECTIVES: &[&str] = &["net ", "pin_in ", "pin_out ", "pin_triout ", "pin_inout "];

/// Path of the bitstream for `top`.
pub fn bitstream_path(top: &str) -> PathBuf {
    PathBuf::from(format!("impl/bitstream/{top}.bit"))
}

/// Path of the post-implementation VHDL netlist for `top`.
pub fn impl_netlist_path(top: &str) -> PathBuf {
    PathBuf::from(format!("impl/netlist/{top}_impl.vhd"))
}

fn placed_path(top: &str) -> PathBuf {
    PathBuf::from(format!("build/{top}_impl.cfg"))
}

/// Plans and interprets the implementation stage.
pub struct ImplementationExecutor;

impl StageExecutor for ImplementationExecutor {
    fn stage(&self) -> Stage {
        Stage::Implementation
    }

    fn plan(&self, ctx: &StageContext<'_>) -> Result<StagePlan, PlanError> {
        let config = &ctx.config.implementation;
        let top = ctx.graph.select_top(
            ccflow_hierarchy::TopTarget::Synthesis,
            ctx.config.synthesis.top.as_deref(),
        )?;
        let netlist = [json_path(&top), netlist_path(&top)]
            .into_iter()
            .find(|p| ctx.root.join(p).is_file())
            .ok_or_else(|| PlanError::MissingInput {
                path: json_path(&top),
                hint: "run synthesis first".to_string(),
            })?;
        let constraints = select_constraint_file(
            ctx.root,
            &ctx.config.project.name,
            config.constraint_file.as_deref(),
        )?;
        let timeout = Some(timeout_secs(config.timeout_secs).unwrap_or(DEFAULT_TIMEOUT));
        let profile = config.strategy.profile();
        let placed = placed_path(&top);
        let bitstream = bitstream_path(&top);

        let mut plan = StagePlan::new(Stage::Implementation, top.clone());
        plan.dirs = ["build", "impl/bitstream", "impl/timing", "impl/netlist"]
            .into_iter()
            .map(PathBuf::from)
            .collect();

        let mut pnr = Invocation::new(format!("place and route {top}"), Tool::PlaceRoute)
            .arg("-i")
            .arg(netlist.display().to_string())
            .arg("-o")
            .arg(placed.display().to_string())
            .arg("-ccf")
            .arg(constraints.display().to_string())
            .arg("--effort")
            .arg(profile.effort.to_string())
            .arg("--place-effort")
            .arg(profile.place_effort.to_string())
            .arg("--route-effort")
            .arg(profile.route_effort.to_string())
            .timeout(timeout);
        if profile.timing_driven {
            pnr = pnr.arg("--timing-driven");
        }
        if profile.congestion_driven {
            pnr = pnr.arg("--congestion-driven");
        }
        let pnr = plan.push(pnr);

        let bit = plan.push(
            Invocation::new(format!("generate bitstream {top}"), Tool::PlaceRoute)
                .args(["--bitstream", "-i"])
                .arg(placed.display().to_string())
                .arg("-o")
                .arg(bitstream.display().to_string())
                .after([pnr])
                .timeout(timeout),
        );
        plan.artifacts.push(placed.clone());
        plan.artifacts.push(bitstream);

        if config.timing_analysis {
            let report = PathBuf::from(format!("impl/timing/{top}_timing.rpt"));
            let sdf = PathBuf::from(format!("impl/timing/{top}.sdf"));
            plan.push(
                Invocation::new(format!("timing analysis {top}"), Tool::PlaceRoute)
                    .args(["--timing-analysis", "-i"])
                    .arg(placed.display().to_string())
                    .arg("--timing-report")
                    .arg(report.display().to_string())
                    .arg("--sdf")
                    .arg(sdf.display().to_string())
                    .after([bit])
                    .timeout(timeout),
            );
            plan.artifacts.push(report);
            plan.artifacts.push(sdf);
        }
        if config.write_netlist {
            let out = impl_netlist_path(&top);
            plan.push(
                Invocation::new(format!("write netlist {top}"), Tool::PlaceRoute)
                    .args(["--write-netlist", "-i"])
                    .arg(placed.display().to_string())
                    .arg("-o")
                    .arg(out.display().to_string())
                    .args(["--format", "vhdl"])
                    .after([pnr])
                    .timeout(timeout),
            );
            plan.artifacts.push(out);
        }
        Ok(plan)
    }

    fn classify(&self, _invocation: &Invocation, outcome: &ProcessOutcome) -> Result<(), String> {
        if let Some(line) = outcome
            .lines
            .iter()
            .find(|l| l.text.trim_start().starts_with("ERROR"))
        {
            return Err(format!("reported: {}", line.text.trim()));
        }
        match outcome.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(format!("exited with code {code}")),
            None => Err("terminated by a signal".to_string()),
        }
    }

    fn suggestion(&self) -> String {
        "check the pin assignments in the constraint file and the p_r log above".to_string()
    }
}

/// Picks the constraint file and returns it relative to `root`.
///
/// An explicit file must exist. Otherwise `constraints/<project>.ccf` is
/// preferred when it assigns pins, then the first `.ccf` (by name) that
/// does, then the first `.ccf` at all.
pub fn select_constraint_file(
    root: &Path,
    project: &str,
    explicit: Option<&Path>,
) -> Result<PathBuf, PlanError> {
    if let Some(path) = explicit {
        let full = root.join(path);
        if !full.is_file() {
            return Err(PlanError::ConstraintFileNotFound(path.to_path_buf()));
        }
        return Ok(relative_to(root, &full));
    }

    let dir = root.join(CONSTRAINTS_DIR);
    let preferred = dir.join(format!("{project}.ccf"));
    if has_active_constraints(&preferred) {
        return Ok(relative_to(root, &preferred));
    }
    let mut available: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|e| e == "ccf") && p.is_file())
                .collect()
        })
        .unwrap_or_default();
    available.sort();
    let chosen = available
        .iter()
        .find(|p| has_active_constraints(p))
        .or_else(|| {
            let first = available.first();
            if let Some(p) = first {
                log::warn!(
                    "{} has no active pin assignments; place and route may fail",
                    p.display()
                );
            }
            first
        })
        .ok_or(PlanError::NoConstraintFile)?;
    Ok(relative_to(root, chosen))
}

/// Returns `true` if the file has at least one uncommented pin directive.
pub fn has_active_constraints(path: &Path) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else {
        return false;
    };
    text.lines()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .any(|l| PIN_DIRECTIVES.iter().any(|d| l.starts_with(d)))
}
