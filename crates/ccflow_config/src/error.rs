//! Why `ccflow.toml` or the settings file could not be used.

use std::path::PathBuf;

/// A configuration file that could not be read, understood, or written.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        /// `ccflow.toml` or `settings.json`.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected sections.
    #[error("invalid ccflow.toml: {0}")]
    ParseError(String),

    /// The in-memory configuration could not be written out.
    #[error("cannot write configuration: {0}")]
    SerializeError(String),

    /// A strategy, board, or tool name is not in its catalogue.
    #[error("unknown {kind} '{name}' (expected one of: {})", valid.join(", "))]
    UnknownOption {
        /// What was named: `board`, `tool`, ...
        kind: &'static str,
        /// The name given.
        name: String,
        /// Accepted names.
        valid: Vec<String>,
    },

    /// A setting the selected option depends on is absent.
    #[error("`{0}` must be set")]
    MissingField(String),

    /// A value is out of range or inconsistent with another.
    #[error("invalid setting: {0}")]
    ValidationError(String),

    /// A simulation profile file is not valid TOML or lacks a field.
    #[error("invalid simulation profile file {}: {reason}", path.display())]
    InvalidProfile {
        /// The file read.
        path: PathBuf,
        /// The parse error text.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_board_lists_the_catalogue() {
        let err = ConfigError::UnknownOption {
            kind: "board",
            name: "de10".into(),
            valid: vec!["olimex_gatemateevb".into(), "gatemate_pgm_spi".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown board 'de10' (expected one of: olimex_gatemateevb, gatemate_pgm_spi)"
        );
    }

    #[test]
    fn missing_field_names_the_key() {
        let err = ConfigError::MissingField("simulation.custom_duration".into());
        assert_eq!(err.to_string(), "`simulation.custom_duration` must be set");
    }

    #[test]
    fn io_error_names_the_file() {
        let err = ConfigError::Io {
            path: PathBuf::from("ccflow.toml"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("cannot access ccflow.toml:"));
    }
}
