//! Error types for hierarchy resolution.

use std::fmt;

use crate::graph::TopTarget;

/// The instantiation graph contains a cycle, so no build order exists.
///
/// `cycle` lists the units on the shortest cycle through the offending
/// back-edge, rotated so the smallest name comes first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct CycleError {
    /// Units on the cycle, each instantiating the next and the last
    /// instantiating the first.
    pub cycle: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instantiation cycle: ")?;
        for name in &self.cycle {
            write!(f, "{name} -> ")?;
        }
        match self.cycle.first() {
            Some(first) => write!(f, "{first}"),
            None => Ok(()),
        }
    }
}

/// Errors from building the hierarchy or selecting a top level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The graph is cyclic.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Several units qualify and none was named explicitly.
    #[error("ambiguous {target} top level: candidates are {}", candidates.join(", "))]
    AmbiguousTopLevel {
        /// The build target being resolved.
        target: TopTarget,
        /// Every qualifying unit, sorted.
        candidates: Vec<String>,
    },

    /// No unit qualifies.
    #[error("no {target} top-level candidate found")]
    NoTopLevel {
        /// The build target being resolved.
        target: TopTarget,
    },

    /// The explicitly named top level is not an indexed unit.
    #[error("top-level unit `{name}` is not declared in any source file")]
    UnknownTopLevel {
        /// The requested name.
        name: String,
    },

    /// A testbench was named as the synthesis top.
    #[error("`{name}` is a testbench and cannot be the synthesis top level")]
    TestbenchAsSynthesisTop {
        /// The requested name.
        name: String,
    },
}
