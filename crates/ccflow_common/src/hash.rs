//! Content hashing for change detection and stage fingerprints.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A 128-bit content hash computed using XXH3.
///
/// Two files with the same `ContentHash` are assumed to have identical content.
/// Serialized as a 32-character lowercase hex string so persisted project
/// records stay readable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Reads a file and hashes its full contents.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&data))
    }

    /// Wraps a raw 128-bit digest.
    pub fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Error returned when a hex string is not a valid [`ContentHash`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content hash `{0}`: expected 32 hex digits")]
pub struct ParseHashError(pub String);

impl FromStr for ContentHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.is_ascii() {
            return Err(ParseHashError(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseHashError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edited_source_changes_the_hash() {
        let before = ContentHash::from_bytes(b"entity blinky is end entity;");
        let same = ContentHash::from_bytes(b"entity blinky is end entity;");
        let after = ContentHash::from_bytes(b"entity blinky is end entity; -- led");
        assert_eq!(before, same);
        assert_ne!(before, after);
    }

    #[test]
    fn hex_text_parses_back() {
        let h = ContentHash::from_bytes(b"synth/blinky_synth.json");
        let text = h.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(text.parse::<ContentHash>().unwrap(), h);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("abc".parse::<ContentHash>().is_err());
        assert!("zz".repeat(16).parse::<ContentHash>().is_err());
        assert!("é".repeat(16).parse::<ContentHash>().is_err());
    }

    #[test]
    fn debug_shows_a_short_prefix() {
        let h = ContentHash::from_u128(0xabcd);
        assert_eq!(format!("{h:?}"), "ContentHash(cdab..)");
    }

    #[test]
    fn persisted_as_hex_string() {
        let h = ContentHash::from_bytes(b"impl/bitstream/blinky.bit");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{h}\""));
        assert_eq!(serde_json::from_str::<ContentHash>(&json).unwrap(), h);
        assert!(serde_json::from_str::<ContentHash>("\"00\"").is_err());
    }

    #[test]
    fn from_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.vhd");
        std::fs::write(&path, b"entity a is end;").unwrap();
        assert_eq!(
            ContentHash::from_file(&path).unwrap(),
            ContentHash::from_bytes(b"entity a is end;")
        );
        assert!(ContentHash::from_file(&dir.path().join("missing.vhd")).is_err());
    }
}
