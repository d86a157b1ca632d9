//! Shared foundational types used across the ccflow workflow manager.
//!
//! This crate provides content hashing for change detection and the
//! incremental fingerprint builder stages use to summarise their inputs.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod hash;

pub use fingerprint::Fingerprinter;
pub use hash::{ContentHash, ParseHashError};
