//! The on-disk project layout.

use std::io;
use std::path::{Path, PathBuf};

/// Directories every project has, relative to its root.
pub const PROJECT_DIRS: &[&str] = &[
    "src",
    "testbench",
    "constraints",
    "synth",
    "sim/behavioral",
    "sim/post-synthesis",
    "sim/post-implementation",
    "impl/bitstream",
    "impl/timing",
    "impl/netlist",
    "build",
    "logs",
    "config",
];

/// Directory holding constraint files.
pub const CONSTRAINTS_DIR: &str = "constraints";

/// Creates any missing project directories under `root`.
pub fn create_layout(root: &Path) -> io::Result<()> {
    for dir in PROJECT_DIRS {
        std::fs::create_dir_all(root.join(dir))?;
    }
    Ok(())
}

/// Directories from [`PROJECT_DIRS`] missing under `root`.
pub fn missing_dirs(root: &Path) -> Vec<PathBuf> {
    PROJECT_DIRS
        .iter()
        .map(PathBuf::from)
        .filter(|d| !root.join(d).is_dir())
        .collect()
}

/// Turns `path` into a path relative to `root` when it lies inside it.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
