//! FormFlow Core
//!
//! This crate provides the engine behind dynamic forms: a schema of fields,
//! some of them derived from others by formula, kept consistent as the user
//! edits. It implements:
//!
//! - The field model and its persisted JSON layout
//! - Declarative validation rules
//! - A dependency graph with cycle detection
//! - A sandboxed formula evaluator
//! - Per-edit recomputation producing `(values, errors)` snapshots
//! - Form building and pluggable persistence
//!
//! The crate is designed to be used both as a native Rust library and, with
//! the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! - `schema`: fields, values and form schemas
//! - `validation`: the rule engine
//! - `graph`: dependency graph and topological order
//! - `formula`: formula parsing and sandboxed evaluation
//! - `reactive`: recompute, the coordinator and sessions
//! - `builder`: the in-progress form a user is authoring
//! - `store`: persistence collaborators
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use formflow_core::reactive::FormSession;
//! use formflow_core::schema::{DerivedSpec, Field, FieldType, FieldValue, FormSchema};
//!
//! let schema = FormSchema::new(
//!     "greeting",
//!     Utc::now(),
//!     vec![
//!         Field::new("first", FieldType::ShortText, "First name").required(),
//!         Field::new("last", FieldType::ShortText, "Last name"),
//!         Field::new("full_name", FieldType::ShortText, "Full name")
//!             .derived_from(DerivedSpec::new(["first", "last"], "first + \" \" + last")),
//!     ],
//! );
//!
//! let mut session = FormSession::new(schema)?;
//! session.set_value("first", "Ada")?;
//! let snapshot = session.set_value("last", "Lovelace")?;
//! assert_eq!(snapshot.value("full_name"), Some(&FieldValue::text("Ada Lovelace")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod formula;
pub mod graph;
pub mod reactive;
pub mod schema;
pub mod store;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use builder::{FieldUpdate, FormBuilder};
pub use config::EngineConfig;
pub use error::{CycleError, FormulaError, SchemaError, SessionError, SubmitError};
pub use formula::{FormulaEvaluator, SandboxEvaluator};
pub use graph::{build_graph, DependencyGraph};
pub use reactive::{recompute, Coordinator, FormSession, Recomputation, Snapshot};
pub use schema::{Field, FieldId, FieldType, FieldValue, FormSchema, Values};
pub use validation::{validate, validate_all, ValidationError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyFormSession>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
