//! Cached tool resolution.

use crate::error::NotFoundError;
use crate::tool::Tool;
use ccflow_config::ToolchainConfig;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// How a tool's executable was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// Found by searching `PATH`.
    SearchPath,
    /// Taken from the configured path.
    ExplicitPath,
}

/// A resolved tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolchainEntry {
    /// Which tool this is.
    pub tool: Tool,
    /// How the path was obtained.
    pub mode: ResolutionMode,
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// Set once a launch through this path has succeeded.
    pub verified: bool,
}

/// Resolves tools to executables and caches the answers.
///
/// Safe to share between threads: the cache is read-mostly, and two
/// concurrent resolutions of the same tool produce the same entry.
#[derive(Debug, Default)]
pub struct Registry {
    configured: RwLock<BTreeMap<Tool, PathBuf>>,
    search_path: Option<OsString>,
    cache: RwLock<HashMap<Tool, ToolchainEntry>>,
}

impl Registry {
    /// A registry with no configured paths, searching the process `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded from the `[toolchain]` section.
    pub fn from_config(config: &ToolchainConfig) -> Self {
        let registry = Self::new();
        for (name, path) in &config.paths {
            match name.parse::<Tool>() {
                Ok(tool) => registry.set_path(tool, Some(path.clone())),
                Err(e) => log::warn!("ignoring toolchain entry: {e}"),
            }
        }
        registry
    }

    /// Searches `path` instead of the process `PATH`.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Sets or clears the configured path for `tool` and drops its cache entry.
    pub fn set_path(&self, tool: Tool, path: Option<PathBuf>) {
        {
            let mut configured = self.configured.write().unwrap_or_else(PoisonError::into_inner);
            match path {
                Some(p) => configured.insert(tool, p),
                None => configured.remove(&tool),
            };
        }
        self.invalidate(tool);
    }

    /// The configured path for `tool`, if any.
    pub fn configured_path(&self, tool: Tool) -> Option<PathBuf> {
        let configured = self.configured.read().unwrap_or_else(PoisonError::into_inner);
        configured.get(&tool).cloned()
    }

    /// Resolves `tool`, consulting the cache first.
    pub fn resolve(&self, tool: Tool) -> Result<ToolchainEntry, NotFoundError> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&tool) {
                return Ok(entry.clone());
            }
        }
        let entry = self.lookup(tool)?;
        log::debug!("resolved {tool} to {} ({:?})", entry.path.display(), entry.mode);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(tool).or_insert(entry).clone())
    }

    /// Forgets the cached resolution of `tool`.
    pub fn invalidate(&self, tool: Tool) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.remove(&tool);
    }

    /// Forgets every cached resolution.
    pub fn invalidate_all(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
    }

    /// Records whether a launch of `tool` succeeded. A failed launch drops
    /// the cache entry so the next resolution looks again.
    pub fn record_launch(&self, tool: Tool, launched: bool) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if launched {
            if let Some(entry) = cache.get_mut(&tool) {
                entry.verified = true;
            }
        } else {
            cache.remove(&tool);
        }
    }

    /// Resolves every known tool.
    pub fn check_all(&self) -> Vec<(Tool, Result<ToolchainEntry, NotFoundError>)> {
        Tool::ALL.into_iter().map(|t| (t, self.resolve(t))).collect()
    }

    fn lookup(&self, tool: Tool) -> Result<ToolchainEntry, NotFoundError> {
        let configured = self.configured_path(tool);
        let mut rejected = None;
        if let Some(path) = &configured {
            match check_explicit(path) {
                Ok(path) => {
                    return Ok(ToolchainEntry {
                        tool,
                        mode: ResolutionMode::ExplicitPath,
                        path,
                        verified: false,
                    })
                }
                Err(reason) => {
                    log::warn!("configured {tool} path {}: {reason}", path.display());
                    rejected = Some(reason);
                }
            }
        }

        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(tool.name(), Some(paths), cwd)
            }
            None => which::which(tool.name()),
        };
        match found {
            Ok(path) => Ok(ToolchainEntry {
                tool,
                mode: ResolutionMode::SearchPath,
                path,
                verified: false,
            }),
            Err(_) => {
                let reason = match rejected {
                    Some(r) => format!("{r}, and not on the search path"),
                    None => "not on the search path".to_string(),
                };
                Err(NotFoundError {
                    tool,
                    configured,
                    reason,
                })
            }
        }
    }
}

fn check_explicit(path: &Path) -> Result<PathBuf, String> {
    if !path.exists() {
        return Err("configured path does not exist".to_string());
    }
    if !is_executable(path) {
        return Err("configured path is not an executable file".to_string());
    }
    std::fs::canonicalize(path).map_err(|e| e.to_string())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
