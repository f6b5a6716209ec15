//! Graph Nodes
//!
//! One node per schema field. Edges are stored in both directions so the
//! builder can walk from a derived field to its parents and from an edited
//! field to everything downstream of it.

use smallvec::SmallVec;

use crate::schema::FieldId;

/// Edge lists stay inline for the common case of a handful of parents.
pub type Edges = SmallVec<[usize; 4]>;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A field whose value is entered directly. Roots of the graph.
    Input,

    /// A field computed from its parents by a formula.
    Derived,
}

/// Where a derived node ended up after ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Placed in the topological order.
    Ordered,

    /// Sits on a dependency cycle.
    Cyclic,

    /// Not on a cycle itself, but reads (directly or not) from one.
    Blocked,
}

/// A field in the dependency graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Position of the field in schema order.
    index: usize,

    id: FieldId,

    kind: NodeKind,

    /// Nodes this node reads from (its parents).
    dependencies: Edges,

    /// Nodes that read from this node.
    dependents: Edges,
}

impl Node {
    pub fn new(index: usize, id: FieldId, kind: NodeKind) -> Self {
        Self {
            index,
            id,
            kind,
            dependencies: Edges::new(),
            dependents: Edges::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_derived(&self) -> bool {
        self.kind == NodeKind::Derived
    }

    /// Add a dependency. Repeated parents collapse to one edge.
    pub fn add_dependency(&mut self, index: usize) {
        if !self.dependencies.contains(&index) {
            self.dependencies.push(index);
        }
    }

    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, index: usize) {
        if !self.dependents.contains(&index) {
            self.dependents.push(index);
        }
    }

    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }
}
