//! The per-user settings record.
//!
//! A single small JSON file remembering the most recently opened project.
//! It is read once at startup and rewritten whenever a project is opened;
//! nothing else in the process holds global project state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

/// Process-wide user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Root of the last project opened.
    #[serde(default)]
    pub last_project: Option<PathBuf>,
}

impl UserSettings {
    /// The default settings directory: `<config dir>/ccflow`, or `~/.ccflow`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("ccflow"))
            .or_else(|| dirs::home_dir().map(|h| h.join(".ccflow")))
    }

    /// Reads settings from `dir`. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(SETTINGS_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        serde_json::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Writes settings to `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let io = |source: std::io::Error| ConfigError::Io {
            path: dir.join(SETTINGS_FILE),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io)?;
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io)?;
        tmp.write_all(text.as_bytes()).map_err(io)?;
        tmp.persist(dir.join(SETTINGS_FILE)).map_err(|e| io(e.error))?;
        Ok(())
    }

    /// Records `project` as the last one opened and saves.
    pub fn remember(&mut self, dir: &Path, project: &Path) -> Result<(), ConfigError> {
        self.last_project = Some(project.to_path_buf());
        self.save(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(UserSettings::load(dir.path()).unwrap(), UserSettings::default());
    }

    #[test]
    fn remember_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ccflow");
        let mut settings = UserSettings::default();
        settings.remember(&nested, Path::new("/work/blinky")).unwrap();
        let loaded = UserSettings::load(&nested).unwrap();
        assert_eq!(loaded.last_project.as_deref(), Some(Path::new("/work/blinky")));
    }

    #[test]
    fn garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        assert!(matches!(
            UserSettings::load(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
