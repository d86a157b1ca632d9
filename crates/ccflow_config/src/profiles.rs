//! Sharing simulation profiles between projects.
//!
//! An exported profile is a small TOML file holding one profile and its
//! name, so it can be imported into another project's `ccflow.toml`.

use crate::error::ConfigError;
use crate::strategy::TimeUnit;
use crate::types::{check_profile, SimProfile, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The contents of an exported profile file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFile {
    /// The profile's name.
    pub name: String,
    /// Stop time in `unit`s.
    pub duration: u64,
    /// Unit of `duration`.
    #[serde(default)]
    pub unit: TimeUnit,
    /// Free text shown when profiles are listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProfileFile {
    /// Splits the file into the name and profile to store.
    pub fn into_profile(self) -> (String, SimProfile) {
        (
            self.name,
            SimProfile {
                duration: self.duration,
                unit: self.unit,
                description: self.description,
            },
        )
    }
}

/// Writes the built-in or user profile `name` to `path`.
pub fn export_profile(sim: &SimulationConfig, name: &str, path: &Path) -> Result<(), ConfigError> {
    let profile = sim.find_profile(name)?;
    let file = ProfileFile {
        name: name.to_string(),
        duration: profile.duration,
        unit: profile.unit,
        description: profile.description,
    };
    let text =
        toml::to_string_pretty(&file).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("exported simulation profile {name} to {}", path.display());
    Ok(())
}

/// Reads a profile written by [`export_profile`].
pub fn read_profile(path: &Path) -> Result<ProfileFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ProfileFile = toml::from_str(&text).map_err(|e| ConfigError::InvalidProfile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let (name, profile) = file.clone().into_profile();
    check_profile(&name, &profile)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_user_profile_imports_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.toml");
        let mut sim = SimulationConfig::default();
        let long = SimProfile {
            description: Some("counter wraps".into()),
            ..SimProfile::new(50, TimeUnit::Us)
        };
        sim.create_profile("long", long.clone()).unwrap();
        export_profile(&sim, "long", &path).unwrap();

        let mut other = SimulationConfig::default();
        let (name, profile) = read_profile(&path).unwrap().into_profile();
        other.create_profile(&name, profile).unwrap();
        assert_eq!(other.find_profile("long").unwrap(), long);
    }

    #[test]
    fn builtin_profiles_export_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quick.toml");
        export_profile(&SimulationConfig::default(), "quick", &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("name = \"quick\""), "{text}");
        assert!(text.contains("duration = 100"), "{text}");
        assert!(matches!(
            export_profile(&SimulationConfig::default(), "forever", &path),
            Err(ConfigError::UnknownOption { .. })
        ));
    }

    #[test]
    fn malformed_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "duration = 10\n").unwrap();
        assert!(matches!(
            read_profile(&path),
            Err(ConfigError::InvalidProfile { .. })
        ));
        std::fs::write(&path, "name = \"custom\"\nduration = 10\n").unwrap();
        assert!(matches!(
            read_profile(&path),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            read_profile(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
