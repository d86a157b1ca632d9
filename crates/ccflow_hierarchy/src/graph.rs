//! Graph construction, ordering, and top-level selection.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use ccflow_diagnostics::{Category, Diagnostic, DiagnosticCode};
use ccflow_source::{resolve_reference, DesignUnit, UnitRole};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::{CycleError, HierarchyError};

/// Which build the top level is being chosen for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopTarget {
    /// Root of the synthesized design.
    Synthesis,
    /// Root of a simulation, normally a testbench.
    Simulation,
}

impl fmt::Display for TopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TopTarget::Synthesis => "synthesis",
            TopTarget::Simulation => "simulation",
        })
    }
}

/// An instantiation naming a unit outside the indexed set.
///
/// Kept as a warning: it may be a vendor primitive or black-box IP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// The instantiating unit.
    pub from: String,
    /// The missing unit name.
    pub name: String,
}

impl UnresolvedReference {
    /// Converts to a warning diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::warning(
            DiagnosticCode::new(Category::Source, 101),
            format!("`{}` instantiates unknown unit `{}`", self.from, self.name),
        )
        .with_note("treated as a black box; the synthesis tool must provide it")
    }
}

/// Serializable view of a built graph, stored in the project record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    /// Units in build order.
    pub order: Vec<String>,
    /// Resolved children of each unit, sorted.
    pub edges: BTreeMap<String, Vec<String>>,
    /// References that did not resolve.
    pub unresolved: Vec<UnresolvedReference>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Directed instantiation graph over design units.
///
/// Only constructed when acyclic, so every value carries a valid build order.
#[derive(Debug, Clone)]
pub struct HierarchyGraph {
    graph: DiGraph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
    roles: HashMap<String, UnitRole>,
    order: Vec<String>,
    unresolved: Vec<UnresolvedReference>,
}

impl HierarchyGraph {
    /// Builds the graph and its build order from a unit set.
    ///
    /// The order is a depth-first postorder with roots and children visited
    /// in ascending name order, so every unit follows all of its dependencies
    /// and an unchanged unit set always yields the same sequence. A back-edge
    /// aborts with [`CycleError`] and no partial order.
    pub fn build(units: &BTreeMap<String, DesignUnit>) -> Result<Self, CycleError> {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        let mut roles = HashMap::new();
        for (name, unit) in units {
            nodes.insert(name.clone(), graph.add_node(name.clone()));
            roles.insert(name.clone(), unit.role);
        }

        let mut unresolved = Vec::new();
        for (name, unit) in units {
            let mut targets = BTreeSet::new();
            for reference in &unit.references {
                match resolve_reference(units, reference) {
                    Some(target) => {
                        targets.insert(target.name.clone());
                    }
                    None => unresolved.push(UnresolvedReference {
                        from: name.clone(),
                        name: reference.clone(),
                    }),
                }
            }
            for target in targets {
                graph.add_edge(nodes[name], nodes[&target], ());
            }
        }

        let mut hierarchy = Self {
            graph,
            nodes,
            roles,
            order: Vec::new(),
            unresolved,
        };
        hierarchy.order = hierarchy.postorder()?;
        Ok(hierarchy)
    }

    fn children(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut children: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        children.sort_unstable();
        children.dedup();
        children
    }

    fn parents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut parents: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect();
        parents.sort_unstable();
        parents.dedup();
        parents
    }

    fn postorder(&self) -> Result<Vec<String>, CycleError> {
        let mut marks: HashMap<&str, Mark> =
            self.nodes.keys().map(|n| (n.as_str(), Mark::Unvisited)).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        for root in self.nodes.keys() {
            if marks[root.as_str()] != Mark::Unvisited {
                continue;
            }
            marks.insert(root, Mark::OnStack);
            let mut stack: Vec<(&str, Vec<&str>, usize)> =
                vec![(root.as_str(), self.children(root), 0)];

            while let Some((node, children, next)) = stack.last_mut() {
                if let Some(&child) = children.get(*next) {
                    *next += 1;
                    match marks[child] {
                        Mark::Unvisited => {
                            marks.insert(child, Mark::OnStack);
                            stack.push((child, self.children(child), 0));
                        }
                        Mark::OnStack => return Err(self.shortest_cycle(child, *node)),
                        Mark::Done => {}
                    }
                } else {
                    let node = *node;
                    marks.insert(node, Mark::Done);
                    order.push(node.to_string());
                    stack.pop();
                }
            }
        }
        Ok(order)
    }

    /// Shortest cycle containing the back-edge `to -> from`: a BFS path
    /// from `from` to `to`, closed by that edge.
    fn shortest_cycle(&self, from: &str, to: &str) -> CycleError {
        let mut prev: HashMap<&str, &str> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(node) = queue.pop_front() {
            if node == to {
                break;
            }
            for child in self.children(node) {
                if seen.insert(child) {
                    prev.insert(child, node);
                    queue.push_back(child);
                }
            }
        }

        let mut cycle = vec![to.to_string()];
        let mut cursor = to;
        while cursor != from {
            match prev.get(cursor) {
                Some(&p) => {
                    cycle.push(p.to_string());
                    cursor = p;
                }
                None => break,
            }
        }
        cycle.reverse();

        if let Some(min) = cycle
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
        {
            cycle.rotate_left(min);
        }
        CycleError { cycle }
    }

    /// Every unit, dependencies first.
    pub fn build_order(&self) -> &[String] {
        &self.order
    }

    /// The units reachable from `top` (inclusive), in build order.
    pub fn closure(&self, top: &str) -> Vec<String> {
        let mut reach = BTreeSet::new();
        let mut pending = vec![top];
        while let Some(node) = pending.pop() {
            if reach.insert(node.to_string()) {
                pending.extend(self.children(node));
            }
        }
        self.order
            .iter()
            .filter(|n| reach.contains(*n))
            .cloned()
            .collect()
    }

    /// Units `name` instantiates directly.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.children(name).into_iter().map(str::to_string).collect()
    }

    /// Units that instantiate `name` directly.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.parents(name).into_iter().map(str::to_string).collect()
    }

    /// References that pointed outside the unit set.
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    fn role(&self, name: &str) -> UnitRole {
        self.roles.get(name).copied().unwrap_or(UnitRole::Design)
    }

    /// Units eligible as top level for `target`, sorted.
    ///
    /// A design unit qualifies when no other design unit instantiates it
    /// (testbench instantiations do not count). For simulation, a testbench
    /// qualifies when nothing instantiates it at all.
    pub fn top_candidates(&self, target: TopTarget) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|name| {
                let parents = self.parents(name);
                match (target, self.role(name)) {
                    (TopTarget::Synthesis, UnitRole::Design) => parents
                        .iter()
                        .all(|p| self.role(p) == UnitRole::Testbench),
                    (TopTarget::Simulation, UnitRole::Testbench) => parents.is_empty(),
                    _ => false,
                }
            })
            .cloned()
            .collect()
    }

    /// Chooses the top level for `target`.
    ///
    /// An explicit name must exist; otherwise exactly one candidate must
    /// qualify. Several candidates yield [`HierarchyError::AmbiguousTopLevel`].
    pub fn select_top(
        &self,
        target: TopTarget,
        explicit: Option<&str>,
    ) -> Result<String, HierarchyError> {
        if let Some(requested) = explicit {
            let name = if self.nodes.contains_key(requested) {
                requested.to_string()
            } else {
                let lower = requested.to_ascii_lowercase();
                if self.nodes.contains_key(&lower) {
                    lower
                } else {
                    return Err(HierarchyError::UnknownTopLevel {
                        name: requested.to_string(),
                    });
                }
            };
            if target == TopTarget::Synthesis && self.role(&name) == UnitRole::Testbench {
                return Err(HierarchyError::TestbenchAsSynthesisTop { name });
            }
            return Ok(name);
        }

        let mut candidates = self.top_candidates(target);
        match candidates.len() {
            0 => Err(HierarchyError::NoTopLevel { target }),
            1 => Ok(candidates.remove(0)),
            _ => Err(HierarchyError::AmbiguousTopLevel { target, candidates }),
        }
    }

    /// Indented instantiation tree below `top`.
    pub fn render_tree(&self, top: &str) -> String {
        let mut out = String::new();
        self.render_node(top, 0, &mut out);
        out
    }

    fn render_node(&self, name: &str, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(name);
        if self.role(name) == UnitRole::Testbench {
            out.push_str(" (testbench)");
        }
        out.push('\n');
        for child in self.children(name) {
            self.render_node(child, depth + 1, out);
        }
        for missing in self.unresolved.iter().filter(|u| u.from == name) {
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(&format!("{} (unresolved)\n", missing.name));
        }
    }

    /// Serializable copy for the project record.
    pub fn snapshot(&self) -> HierarchySnapshot {
        HierarchySnapshot {
            order: self.order.clone(),
            edges: self
                .nodes
                .keys()
                .map(|n| (n.clone(), self.dependencies(n)))
                .collect(),
            unresolved: self.unresolved.clone(),
        }
    }
}
