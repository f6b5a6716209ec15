//! Dependency Graph Builder
//!
//! Builds the derived-field graph of a schema and orders it so that every
//! derived field comes after all of its parents.
//!
//! # Algorithm
//!
//! 1. One node per field; an edge parent -> derived for each declared parent
//!    that exists in the schema (dangling parents are a schema error, not a
//!    graph concern, and are skipped here).
//! 2. Kahn's algorithm over the derived nodes. Input fields are already
//!    resolved, so only parents that are themselves derived count toward a
//!    node's in-degree. The ready set is keyed by schema position, so ties
//!    always resolve in display order.
//! 3. Derived nodes Kahn could not place are split into nodes that sit on a
//!    cycle and nodes that are merely downstream of one.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use super::node::{Node, NodeKind, Resolution};
use crate::error::CycleError;
use crate::schema::{FieldId, FormSchema};

/// Derived-field dependency graph of one schema.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// One node per schema field, in schema order.
    nodes: Vec<Node>,

    /// Field id to node index. The first field wins on duplicate ids.
    index: HashMap<FieldId, usize>,

    /// Derived nodes in topological order.
    order: Vec<usize>,

    /// Per-node placement; `None` for input nodes.
    resolution: Vec<Option<Resolution>>,

    cycle: Option<CycleError>,
}

impl DependencyGraph {
    /// Build the graph, failing if any cycle exists.
    pub fn build(schema: &FormSchema) -> Result<Self, CycleError> {
        let graph = Self::build_lenient(schema);
        match graph.cycle {
            Some(ref cycle) => Err(cycle.clone()),
            None => Ok(graph),
        }
    }

    /// Build the graph, leaving cyclic fields (and fields downstream of
    /// them) out of the order instead of failing.
    ///
    /// The cycle, if any, is available from [`cycle`](Self::cycle).
    pub fn build_lenient(schema: &FormSchema) -> Self {
        let mut nodes = Vec::with_capacity(schema.fields.len());
        let mut index = HashMap::with_capacity(schema.fields.len());

        for (i, field) in schema.fields.iter().enumerate() {
            let kind = if field.is_derived() {
                NodeKind::Derived
            } else {
                NodeKind::Input
            };
            nodes.push(Node::new(i, field.id.clone(), kind));
            index.entry(field.id.clone()).or_insert(i);
        }

        for (i, field) in schema.fields.iter().enumerate() {
            for parent in field.parents() {
                if let Some(&p) = index.get(parent.as_str()) {
                    nodes[i].add_dependency(p);
                    nodes[p].add_dependent(i);
                }
            }
        }

        let mut graph = Self {
            resolution: nodes
                .iter()
                .map(|n| n.is_derived().then_some(Resolution::Blocked))
                .collect(),
            nodes,
            index,
            order: Vec::new(),
            cycle: None,
        };
        graph.order_derived();
        graph
    }

    /// Kahn's algorithm over the derived nodes, then cycle classification
    /// of whatever is left.
    fn order_derived(&mut self) {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut ready = BTreeSet::new();

        for node in self.nodes.iter().filter(|n| n.is_derived()) {
            let degree = node
                .dependencies()
                .iter()
                .filter(|&&d| self.nodes[d].is_derived())
                .count();
            in_degree[node.index()] = degree;
            if degree == 0 {
                ready.insert(node.index());
            }
        }

        while let Some(i) = ready.pop_first() {
            self.order.push(i);
            self.resolution[i] = Some(Resolution::Ordered);

            for &dependent in self.nodes[i].dependents() {
                let degree = &mut in_degree[dependent];
                *degree = degree.saturating_sub(1);
                if *degree == 0 && self.resolution[dependent] == Some(Resolution::Blocked) {
                    ready.insert(dependent);
                }
            }
        }

        let pending: Vec<bool> = self
            .resolution
            .iter()
            .map(|r| *r == Some(Resolution::Blocked))
            .collect();

        let mut cyclic = Vec::new();
        for i in (0..self.nodes.len()).filter(|&i| pending[i]) {
            if self.on_cycle(i, &pending) {
                self.resolution[i] = Some(Resolution::Cyclic);
                cyclic.push(self.nodes[i].id().clone());
            }
        }

        debug!(
            fields = self.nodes.len(),
            ordered = self.order.len(),
            unresolved = pending.iter().filter(|p| **p).count(),
            "built dependency graph"
        );

        if !cyclic.is_empty() {
            let cycle = CycleError { fields: cyclic };
            warn!(%cycle, "derived fields form a cycle");
            self.cycle = Some(cycle);
        }
    }

    /// Whether `start` can reach itself through unresolved parents.
    fn on_cycle(&self, start: usize, pending: &[bool]) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<usize> = self.nodes[start]
            .dependencies()
            .iter()
            .copied()
            .filter(|&d| pending[d])
            .collect();

        while let Some(i) = stack.pop() {
            if i == start {
                return true;
            }
            if !seen.insert(i) {
                continue;
            }
            stack.extend(
                self.nodes[i]
                    .dependencies()
                    .iter()
                    .copied()
                    .filter(|&d| pending[d]),
            );
        }
        false
    }

    /// Derived fields in evaluation order. Cyclic and blocked fields are
    /// not included.
    pub fn topological_order(&self) -> impl Iterator<Item = &FieldId> + '_ {
        self.order.iter().map(|&i| self.nodes[i].id())
    }

    /// Derived fields reachable from `id`, in evaluation order.
    ///
    /// `id` itself is included only when it is a derived field that is
    /// downstream of itself, which cannot happen for ordered fields.
    pub fn downstream(&self, id: &str) -> Vec<FieldId> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut reached = HashSet::new();
        let mut queue: VecDeque<usize> = self.nodes[start].dependents().iter().copied().collect();
        while let Some(i) = queue.pop_front() {
            if reached.insert(i) {
                queue.extend(self.nodes[i].dependents().iter().copied());
            }
        }

        self.order
            .iter()
            .filter(|i| reached.contains(*i))
            .map(|&i| self.nodes[i].id().clone())
            .collect()
    }

    /// The cycle found while building, if any.
    pub fn cycle(&self) -> Option<&CycleError> {
        self.cycle.as_ref()
    }

    /// Placement of a derived field; `None` for inputs and unknown ids.
    pub fn resolution(&self, id: &str) -> Option<Resolution> {
        self.index.get(id).and_then(|&i| self.resolution[i])
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Parents of `id` that exist in the schema.
    pub fn parents(&self, id: &str) -> Vec<&FieldId> {
        self.node(id)
            .map(|n| {
                n.dependencies()
                    .iter()
                    .map(|&d| self.nodes[d].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fields that read `id` directly.
    pub fn dependents(&self, id: &str) -> Vec<&FieldId> {
        self.node(id)
            .map(|n| n.dependents().iter().map(|&d| self.nodes[d].id()).collect())
            .unwrap_or_default()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Build the dependency graph of `schema`, failing on any cycle.
pub fn build_graph(schema: &FormSchema) -> Result<DependencyGraph, CycleError> {
    DependencyGraph::build(schema)
}
