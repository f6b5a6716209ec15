//! Error Types
//!
//! Every failure the engine can report is a typed value. Nothing here is
//! meant to abort the process: schema and cycle problems stop evaluation of
//! the affected schema or fields, formula failures are recovered per field,
//! and validation failures are plain data (see [`crate::validation`]).

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::schema::FieldId;
use crate::validation::ValidationError;

fn display_ids(ids: &[FieldId]) -> String {
    ids.iter()
        .map(FieldId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single problem found in a form schema.
///
/// Every variant but `LengthBoundsInverted` is structural and fails
/// [`FormSchema::is_structurally_sound`](crate::schema::FormSchema::is_structurally_sound);
/// inverted bounds are only reported by
/// [`FormSchema::warnings`](crate::schema::FormSchema::warnings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("field id `{0}` is used by more than one field")]
    DuplicateId(FieldId),

    #[error("field `{field}` derives from unknown field `{parent}`")]
    DanglingParent { field: FieldId, parent: FieldId },

    #[error("field `{0}` lists itself as a parent")]
    SelfReference(FieldId),

    #[error("choice field `{0}` has no options")]
    MissingOptions(FieldId),

    #[error("choice field `{field}` repeats option `{option}`")]
    DuplicateOption { field: FieldId, option: String },

    #[error("field `{field}` has maxLength {max} below minLength {min}")]
    LengthBoundsInverted { field: FieldId, min: u32, max: u32 },
}

impl SchemaViolation {
    /// The field the violation is attributed to.
    pub fn field_id(&self) -> &FieldId {
        match self {
            Self::DuplicateId(id)
            | Self::SelfReference(id)
            | Self::MissingOptions(id) => id,
            Self::DanglingParent { field, .. }
            | Self::DuplicateOption { field, .. }
            | Self::LengthBoundsInverted { field, .. } => field,
        }
    }
}

/// A schema failed its structural checks.
///
/// Carries every violation found, not just the first, so a caller can
/// show all of them at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("form schema has {} structural problem(s)", .violations.len())]
pub struct SchemaError {
    pub violations: Vec<SchemaViolation>,
}

/// The derived-field graph contains at least one cycle.
///
/// `fields` names every field that sits on a cycle, in schema order.
/// Fields that merely read from a cyclic field are not listed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle through fields: {}", display_ids(.fields))]
pub struct CycleError {
    pub fields: Vec<FieldId>,
}

impl CycleError {
    pub fn contains(&self, id: &str) -> bool {
        self.fields.iter().any(|f| f.as_str() == id)
    }
}

/// A formula could not be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("function `{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("parent index {index} out of range for {len} parent(s)")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("invalid date `{0}`")]
    InvalidDate(String),

    #[error("formula did not produce a scalar value")]
    NonScalar,

    #[error("formula exceeds sandbox limit: {0}")]
    Limit(String),
}

impl Serialize for FormulaError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Failures while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the in-progress form builder.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("no field with id `{0}`")]
    UnknownField(FieldId),

    #[error("position {index} is out of range for {len} field(s)")]
    PositionOutOfRange { index: usize, len: usize },

    #[error("form name must not be empty")]
    EmptyName,

    #[error("form must contain at least one field")]
    NoFields,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a running form session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no field with id `{0}`")]
    UnknownField(FieldId),
}

/// A submit request found invalid fields.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct SubmitError {
    pub errors: IndexMap<FieldId, ValidationError>,
}
