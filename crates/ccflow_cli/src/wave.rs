//! `ccflow wave`.

use chrono::Local;
use ccflow_pipeline::Waveform;
use ccflow_state::Stage;

use crate::project;
use crate::GlobalArgs;

/// Runs `ccflow wave`: lists the available waveforms, or opens one.
pub fn run(
    stage: Option<Stage>,
    list: bool,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    if list {
        let waveforms = project.waveforms();
        if waveforms.is_empty() {
            eprintln!("no simulation has produced a waveform yet");
        }
        for waveform in &waveforms {
            println!("{}", describe(waveform));
        }
        return Ok(0);
    }
    let opened = project.view_waveform(stage)?;
    if !global.quiet {
        eprintln!("      Opened {} ({})", opened.path.display(), opened.stage);
    }
    Ok(0)
}

/// Accepts only the stages that write a waveform.
pub fn simulation_stage(text: &str) -> Result<Stage, String> {
    let stage: Stage = text.parse().map_err(|e: ccflow_state::UnknownStageError| e.to_string())?;
    if stage.is_simulation() {
        Ok(stage)
    } else {
        Err(format!(
            "{stage} writes no waveform (expected behavioral-sim, post-synth-sim or post-impl-sim)"
        ))
    }
}

fn describe(waveform: &Waveform) -> String {
    let finished = waveform
        .finished_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<15} {:<10} {:<20} {}",
        waveform.stage.as_str(),
        waveform.status.as_str(),
        finished,
        waveform.path.display()
    )
}
