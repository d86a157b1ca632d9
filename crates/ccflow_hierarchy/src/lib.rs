//! Hierarchy Graph: instantiation dependencies between design units.
//!
//! [`HierarchyGraph::build`] turns an indexed unit set into a directed graph
//! (instantiating unit to instantiated unit), rejects cycles, and produces a
//! deterministic dependencies-first build order. It also answers top-level
//! selection for synthesis and simulation without guessing when several
//! candidates exist.

#![warn(missing_docs)]

pub mod error;
pub mod graph;

pub use error::{CycleError, HierarchyError};
pub use graph::{HierarchyGraph, HierarchySnapshot, TopTarget, UnresolvedReference};
