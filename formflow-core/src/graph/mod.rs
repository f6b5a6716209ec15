//! Dependency Graph
//!
//! This module builds the graph of derived fields and the fields they read.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes are schema fields, either entered directly (inputs) or derived
//! - Edges run from a parent to every derived field that reads it
//!
//! When a value changes, the coordinator walks the graph forward from the
//! edited field to find every derived field that must recompute, and visits
//! them in topological order.
//!
//! The graph must be acyclic to be evaluated. Cycles are detected at build
//! time and the fields on them are named, so a caller can show which fields
//! are unusable while the rest of the form keeps working.

mod builder;
mod node;

pub use builder::{build_graph, DependencyGraph};
pub use node::{Node, NodeKind, Resolution};
