//! The project run lock.
//!
//! A stage holds `config/.lock` from the moment it is marked running until
//! its result is saved. On Unix the lock is an advisory `flock`, so it goes
//! away with the process that held it: a record left `running` while the
//! lock is free was written by a process that died. Elsewhere the file's
//! existence is the lock, and a crash leaves it behind until it is deleted.
//!
//! The holder writes its pid and stage into the file so other processes can
//! say what is running.

use crate::stage::Stage;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Location of the lock file relative to the project root.
pub const LOCK_FILE: &str = "config/.lock";

/// The lock file path for a project rooted at `root`.
pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

/// Who holds a project's run lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHolder {
    /// The holding process.
    pub pid: u32,
    /// The stage it runs.
    pub stage: Stage,
}

impl LockHolder {
    fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let pid = words.next()?.parse().ok()?;
        let stage = words.next()?.parse().ok()?;
        Some(LockHolder { pid, stage })
    }
}

/// An exclusive claim on running a stage of one project. Released on drop.
pub struct RunLock {
    file: imp::Locked,
    path: PathBuf,
}

impl RunLock {
    /// Takes the lock to run `stage`.
    ///
    /// Returns `None` if another handle or process holds it. Two handles in
    /// one process exclude each other like two processes do.
    pub fn try_acquire(root: &Path, stage: Stage) -> io::Result<Option<RunLock>> {
        let path = lock_path(root);
        let Some(file) = imp::try_lock(&path)? else {
            return Ok(None);
        };
        let mut out: &File = &file;
        out.set_len(0)?;
        write!(out, "{} {stage}", std::process::id())?;
        out.flush()?;
        log::debug!("locked {} for {stage}", path.display());
        Ok(Some(RunLock { file, path }))
    }

    /// Whether a handle or process holds the lock right now.
    pub fn is_held(root: &Path) -> io::Result<bool> {
        Ok(imp::try_lock(&lock_path(root))?.is_none())
    }

    /// The holder as recorded in the lock file.
    ///
    /// `None` if the file is missing, empty, or not yet written by a new
    /// holder. Only meaningful while [`RunLock::is_held`] is true.
    pub fn holder(root: &Path) -> Option<LockHolder> {
        let text = std::fs::read_to_string(lock_path(root)).ok()?;
        LockHolder::parse(&text)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let file: &File = &self.file;
        if let Err(e) = file.set_len(0) {
            log::debug!("cannot clear {}: {e}", self.path.display());
        }
        log::debug!("unlocked {}", self.path.display());
    }
}

#[cfg(unix)]
fn open(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};
    use std::fs::File;
    use std::io;
    use std::path::Path;

    pub type Locked = Flock<File>;

    pub fn try_lock(path: &Path) -> io::Result<Option<Locked>> {
        let file = super::open(path)?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Some(lock)),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(errno.into()),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs::File;
    use std::io;
    use std::ops::Deref;
    use std::path::{Path, PathBuf};

    pub struct Locked {
        file: File,
        path: PathBuf,
    }

    impl Deref for Locked {
        type Target = File;

        fn deref(&self) -> &File {
            &self.file
        }
    }

    impl Drop for Locked {
        fn drop(&mut self) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!("cannot remove {}: {e}", self.path.display());
            }
        }
    }

    pub fn try_lock(path: &Path) -> io::Result<Option<Locked>> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        match std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => Ok(Some(Locked {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }
}
