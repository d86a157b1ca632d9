//! Incremental fingerprints over labelled stage inputs.

use crate::hash::ContentHash;
use xxhash_rust::xxh3::Xxh3;

/// Streams labelled fields into a single XXH3-128 digest.
///
/// Every field is framed with its label and length so that moving bytes
/// between adjacent fields always changes the result.
pub struct Fingerprinter {
    state: Xxh3,
}

impl Fingerprinter {
    /// Starts a fingerprint in the given domain (usually the stage name).
    pub fn new(domain: &str) -> Self {
        let mut fp = Self { state: Xxh3::new() };
        fp.field("domain", domain.as_bytes());
        fp
    }

    /// Adds a raw byte field.
    pub fn field(&mut self, label: &str, value: &[u8]) -> &mut Self {
        self.state.update(&(label.len() as u64).to_le_bytes());
        self.state.update(label.as_bytes());
        self.state.update(&(value.len() as u64).to_le_bytes());
        self.state.update(value);
        self
    }

    /// Adds a string field.
    pub fn text(&mut self, label: &str, value: &str) -> &mut Self {
        self.field(label, value.as_bytes())
    }

    /// Adds a previously computed hash.
    pub fn hash(&mut self, label: &str, value: &ContentHash) -> &mut Self {
        self.field(label, value.as_bytes())
    }

    /// Adds an optional hash; absence hashes differently from any value.
    pub fn opt_hash(&mut self, label: &str, value: Option<&ContentHash>) -> &mut Self {
        match value {
            Some(h) => self.field(label, h.as_bytes()),
            None => self.field(label, b"<none>"),
        }
    }

    /// Finishes and returns the digest.
    pub fn finish(&self) -> ContentHash {
        ContentHash::from_u128(self.state.digest128())
    }
}
