//! `ccflow profile`: user simulation profiles.

use ccflow_config::{builtin_profiles, SimProfile, SimulationConfig, TimeUnit};

use crate::project;
use crate::{GlobalArgs, ProfileCommand};

/// Runs a `ccflow profile` subcommand.
pub fn run(command: &ProfileCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::open(global, false)?;
    match command {
        ProfileCommand::List => {
            for line in listing(&project.config().simulation) {
                println!("{line}");
            }
        }
        ProfileCommand::Create {
            name,
            duration,
            unit,
            description,
        } => {
            let profile = SimProfile {
                description: description.clone(),
                ..SimProfile::new(*duration, *unit)
            };
            let replaced = project.create_profile(name, profile)?;
            if !global.quiet {
                let verb = if replaced.is_some() { "Replaced" } else { "Created" };
                eprintln!("{verb:>12} {name} ({duration}{unit})");
            }
        }
        ProfileCommand::Delete { name } => {
            project.delete_profile(name)?;
            if !global.quiet {
                eprintln!("     Deleted {name}");
            }
        }
        ProfileCommand::Export { name, file } => {
            project.export_profile(name, file)?;
            if !global.quiet {
                eprintln!("    Exported {name} to {}", file.display());
            }
        }
        ProfileCommand::Import { file } => {
            let name = project.import_profile(file)?;
            if !global.quiet {
                eprintln!("    Imported {name}");
            }
        }
    }
    Ok(0)
}

/// Parses a `--unit` value.
pub fn time_unit(text: &str) -> Result<TimeUnit, String> {
    Ok(match text {
        "fs" => TimeUnit::Fs,
        "ps" => TimeUnit::Ps,
        "ns" => TimeUnit::Ns,
        "us" => TimeUnit::Us,
        "ms" => TimeUnit::Ms,
        "sec" | "s" => TimeUnit::Sec,
        _ => return Err(format!("unknown time unit '{text}' (expected fs, ps, ns, us, ms or sec)")),
    })
}

/// One line per selectable profile. `*` marks the selected one.
fn listing(sim: &SimulationConfig) -> Vec<String> {
    let builtin = builtin_profiles();
    sim.all_profiles()
        .into_iter()
        .map(|(name, profile)| {
            let marker = if sim.profile == name { '*' } else { ' ' };
            let origin = if sim.profiles.contains_key(&name) {
                "user"
            } else if builtin.contains_key(&name) {
                "built-in"
            } else {
                "-"
            };
            let length = format!("{}{}", profile.duration, profile.unit);
            let line = format!("{marker} {name:<12} {length:<10} {origin:<8}");
            match &profile.description {
                Some(text) => format!("{line} {text}"),
                None => line.trim_end().to_string(),
            }
        })
        .collect()
}
