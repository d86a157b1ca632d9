//! `ccflow run`: drives stages one after another.
//!
//! Stages run in the order given and the first failure stops the rest.
//! Ctrl-C cancels the running stage; it is recorded as failed once the tool
//! has exited.

use std::sync::Arc;

use ccflow_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use ccflow_pipeline::{Project, StageReport};
use ccflow_process::Stream;
use ccflow_state::Stage;

use crate::project::{self, print_refresh};
use crate::GlobalArgs;

/// Runs the `ccflow run` command.
pub fn run(stages: &[Stage], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Arc::new(project::open(global, false)?);
    print_refresh(&project.last_refresh(), global);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let watcher = {
            let project = Arc::clone(&project);
            tokio::spawn(async move {
                loop {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    if !project.cancel() {
                        log::info!("nothing to cancel");
                    }
                }
            })
        };
        let code = run_all(&project, stages, global).await;
        watcher.abort();
        code
    })
}

async fn run_all(
    project: &Project,
    stages: &[Stage],
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let quiet = global.quiet;
    let observer = move |stream: Stream, line: &str| {
        if quiet {
            return;
        }
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    };
    for &stage in stages {
        if !quiet {
            eprintln!("     Running {stage}");
        }
        let report = project.run_stage(stage, &observer).await?;
        if !print_report(&report, global) {
            return Ok(1);
        }
    }
    Ok(0)
}

/// Prints a finished stage and returns whether it succeeded.
fn print_report(report: &StageReport, global: &GlobalArgs) -> bool {
    if let Some(diagnostic) = report.to_diagnostic() {
        let renderer = TerminalRenderer::new(global.color);
        eprint!("{}", renderer.render(&diagnostic));
        return false;
    }
    if !global.quiet {
        eprintln!("    Finished {} (top `{}`)", report.stage, report.top);
        for artifact in &report.artifacts {
            eprintln!("              {}", artifact.path.display());
        }
        for stage in &report.newly_stale {
            eprintln!("       Stale {stage}");
        }
    }
    report.succeeded()
}
