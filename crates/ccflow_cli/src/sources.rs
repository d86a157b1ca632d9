//! `ccflow add`, `remove`, `set-top` and `set-testbench`.

use std::path::PathBuf;

use ccflow_source::UnitRole;

use crate::project::{self, print_refresh};
use crate::GlobalArgs;

/// Runs `ccflow add`.
pub fn add(
    files: &[PathBuf],
    testbench: bool,
    replace: bool,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    let role = if testbench {
        UnitRole::Testbench
    } else {
        UnitRole::Design
    };
    for file in files {
        let (path, report) = project.add_source(file, role, replace)?;
        if !global.quiet {
            eprintln!("       Added {}", path.display());
        }
        print_refresh(&report, global);
    }
    Ok(0)
}

/// Runs `ccflow remove`.
pub fn remove(files: &[PathBuf], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    for file in files {
        let report = project.remove_source(file)?;
        if !global.quiet {
            eprintln!("     Removed {}", file.display());
        }
        print_refresh(&report, global);
    }
    Ok(0)
}

/// Runs `ccflow set-top`.
pub fn set_top(name: Option<&str>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    let report = project.set_top(name)?;
    announce("synthesis", project.status().synthesis_top, global);
    print_refresh(&report, global);
    Ok(0)
}

/// Runs `ccflow set-testbench`.
pub fn set_testbench(
    name: Option<&str>,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    let report = project.set_testbench(name)?;
    announce("simulation", project.status().simulation_top, global);
    print_refresh(&report, global);
    Ok(0)
}

fn announce<E: std::fmt::Display>(target: &str, top: Result<String, E>, global: &GlobalArgs) {
    if global.quiet {
        return;
    }
    match top {
        Ok(top) => eprintln!("         Top {target}: {top}"),
        Err(e) => log::warn!("no {target} top: {e}"),
    }
}
