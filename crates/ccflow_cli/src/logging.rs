//! The process-wide logger.
//!
//! Records go to stderr at the level chosen by `--quiet`/`--verbose`, and
//! every debug-or-higher record is also appended with a timestamp to
//! `logs/ccflow.log` once a project has been opened.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// File the log is mirrored into, relative to the project root.
pub const LOG_FILE: &str = "logs/ccflow.log";

struct CliLogger {
    stderr: OnceLock<LevelFilter>,
    file: Mutex<Option<File>>,
}

static LOGGER: CliLogger = CliLogger {
    stderr: OnceLock::new(),
    file: Mutex::new(None),
};

/// The stderr level for the global flags.
pub fn stderr_level(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the logger. Later calls are ignored.
pub fn init(level: LevelFilter) {
    if LOGGER.stderr.set(level).is_err() {
        return;
    }
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Starts mirroring records into the project's log file.
pub fn attach(root: &Path) -> io::Result<()> {
    let path = root.join(LOG_FILE);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(
        file,
        "{} ---- ccflow {} ----",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        std::env::args().skip(1).collect::<Vec<_>>().join(" ")
    )?;
    *LOGGER.file.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
    Ok(())
}

impl CliLogger {
    fn stderr_level(&self) -> LevelFilter {
        self.stderr.get().copied().unwrap_or(LevelFilter::Info)
    }
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if record.level() <= self.stderr_level() {
            match record.level() {
                Level::Error => eprintln!("error: {}", record.args()),
                Level::Warn => eprintln!("warning: {}", record.args()),
                _ => eprintln!("  {}", record.args()),
            }
        }
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            let _ = writeln!(
                file,
                "{} {:<5} {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            let _ = file.flush();
        }
    }
}
