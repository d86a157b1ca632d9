//! ccflow CLI, the command-line front end of the GateMate workflow manager.
//!
//! `ccflow init` scaffolds a project, `ccflow add`/`remove` manage sources,
//! `ccflow run` drives pipeline stages through GHDL, Yosys, p_r and
//! openFPGALoader, and `ccflow status` shows what is current and what is
//! stale. `ccflow wave` opens simulation waveforms and `ccflow profile`
//! manages simulation lengths.

#![warn(missing_docs)]

mod configure;
mod init;
mod logging;
mod profile;
mod project;
mod run;
mod sources;
mod status;
mod toolchain;
mod wave;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use ccflow_config::TimeUnit;
use ccflow_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use ccflow_pipeline::PipelineError;
use ccflow_state::Stage;
use ccflow_toolchain::Tool;
use clap::{Parser, Subcommand, ValueEnum};

/// ccflow drives the Cologne Chip GateMate FPGA toolchain.
#[derive(Parser, Debug)]
#[command(name = "ccflow", version, about = "GateMate FPGA workflow manager")]
pub struct Cli {
    /// Only print errors and failed-stage reports.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also print debug records, including every line a tool prints.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// When to colour diagnostics.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a project's `ccflow.toml`, or its directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// ccflow subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project.
    Init(InitArgs),
    /// Open a project, re-index its sources, and report what changed.
    Open {
        /// Discard the stage history and rebuild the project record.
        #[arg(long)]
        reindex: bool,
    },
    /// Add HDL source files to the project.
    Add {
        /// Files to add.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Add the files as testbenches.
        #[arg(short, long)]
        testbench: bool,

        /// Overwrite project files of the same name.
        #[arg(long)]
        replace: bool,
    },
    /// Delete source files from the project.
    Remove {
        /// Files to remove, relative to the project root.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Choose the synthesis top level.
    SetTop {
        /// Unit name. Omit to go back to automatic selection.
        name: Option<String>,
    },
    /// Choose the simulation top level.
    SetTestbench {
        /// Testbench name. Omit to go back to automatic selection.
        name: Option<String>,
    },
    /// Run pipeline stages in the order given.
    Run {
        /// Stages: behavioral-sim, synthesis, post-synth-sim,
        /// implementation, post-impl-sim, upload.
        #[arg(required = true)]
        stages: Vec<Stage>,
    },
    /// Show stage status, top levels, and the hierarchy.
    Status,
    /// Manage tool locations.
    #[command(subcommand)]
    Toolchain(ToolchainCommand),
    /// Show or change `ccflow.toml` settings.
    Configure {
        /// Settings as `section.key=value`, e.g. `synthesis.strategy=area`.
        assignments: Vec<String>,
    },
    /// Open a simulation waveform in the viewer.
    Wave {
        /// behavioral-sim, post-synth-sim or post-impl-sim. Defaults to the
        /// most recent simulation.
        #[arg(value_parser = wave::simulation_stage)]
        stage: Option<Stage>,

        /// List the available waveforms instead.
        #[arg(short, long)]
        list: bool,
    },
    /// Manage simulation profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

/// Arguments for `ccflow init`.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Project directory. Defaults to the current directory.
    pub dir: Option<PathBuf>,

    /// Project name. Defaults to the directory name.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Skip the template design, testbench, and constraint file.
    #[arg(long)]
    pub bare: bool,
}

/// `ccflow toolchain` subcommands.
#[derive(Subcommand, Debug)]
pub enum ToolchainCommand {
    /// Resolve every tool and show where it was found.
    Check,
    /// Set the executable used for a tool.
    SetPath {
        /// Tool: ghdl, yosys, p_r, openFPGALoader, gtkwave.
        tool: Tool,
        /// Executable path. Omit to search `PATH` again.
        path: Option<PathBuf>,
    },
}

/// `ccflow profile` subcommands.
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the built-in and user profiles.
    List,
    /// Add or replace a user profile.
    Create {
        /// Profile name.
        name: String,
        /// Simulation length in `--unit`s.
        duration: u64,
        /// fs, ps, ns, us, ms or sec.
        #[arg(short, long, default_value = "ns", value_parser = profile::time_unit)]
        unit: TimeUnit,
        /// Shown by `ccflow profile list`.
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Remove a user profile.
    Delete {
        /// Profile name.
        name: String,
    },
    /// Write a profile to a file.
    Export {
        /// Profile name.
        name: String,
        /// Destination file.
        file: PathBuf,
    },
    /// Add the profile stored in a file.
    Import {
        /// File written by `ccflow profile export`.
        file: PathBuf,
    },
}

/// `--color` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Colour when stderr is a terminal.
    Auto,
    /// Always colour.
    Always,
    /// Never colour.
    Never,
}

/// The global flags, resolved once and passed to every command.
pub struct GlobalArgs {
    /// `--quiet`.
    pub quiet: bool,
    /// `--verbose`.
    pub verbose: bool,
    /// Colour after resolving `auto`.
    pub color: bool,
    /// Optional path to the project configuration.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    logging::init(logging::stderr_level(global.quiet, global.verbose));

    let result = match cli.command {
        Command::Init(ref args) => init::run(args, &global),
        Command::Open { reindex } => project::run_open(reindex, &global),
        Command::Add {
            ref files,
            testbench,
            replace,
        } => sources::add(files, testbench, replace, &global),
        Command::Remove { ref files } => sources::remove(files, &global),
        Command::SetTop { ref name } => sources::set_top(name.as_deref(), &global),
        Command::SetTestbench { ref name } => sources::set_testbench(name.as_deref(), &global),
        Command::Run { ref stages } => run::run(stages, &global),
        Command::Status => status::run(&global),
        Command::Toolchain(ref command) => toolchain::run(command, &global),
        Command::Configure { ref assignments } => configure::run(assignments, &global),
        Command::Wave { stage, list } => wave::run(stage, list, &global),
        Command::Profile(ref command) => profile::run(command, &global),
    };

    match result {
        Ok(code) => {
            log::logger().flush();
            process::exit(code)
        }
        Err(e) => {
            let renderer = TerminalRenderer::new(global.color);
            match e.downcast_ref::<PipelineError>() {
                Some(err) => eprint!("{}", renderer.render(&err.to_diagnostic())),
                None => eprintln!("error: {e}"),
            }
            log::debug!("command failed: {e}");
            log::logger().flush();
            process::exit(1);
        }
    }
}
