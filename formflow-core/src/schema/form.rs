//! Form Schemas
//!
//! A named, timestamped, ordered list of fields. Field order is display and
//! tab order and is the only ordering authority the engine uses.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::error::{SchemaError, SchemaViolation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub name: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    pub fields: Vec<Field>,
}

impl FormSchema {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            created_at,
            updated_at: None,
            fields,
        }
    }

    /// Look up a field by id.
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id.as_str() == id)
    }

    /// Position of a field in display order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id.as_str() == id)
    }

    /// Fields that carry a derived spec, in schema order.
    pub fn derived_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_derived())
    }

    /// Collect every structural problem in the schema.
    ///
    /// Cycles are not structural problems (a self reference is the one
    /// exception); they are reported by the graph builder.
    pub fn violations(&self) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) && reported.insert(field.id.as_str()) {
                violations.push(SchemaViolation::DuplicateId(field.id.clone()));
            }
        }

        for field in &self.fields {
            if field.field_type.is_choice() {
                if field.options.is_empty() {
                    violations.push(SchemaViolation::MissingOptions(field.id.clone()));
                }
                let mut options = HashSet::new();
                for option in &field.options {
                    if !options.insert(option.as_str()) {
                        violations.push(SchemaViolation::DuplicateOption {
                            field: field.id.clone(),
                            option: option.clone(),
                        });
                    }
                }
            }

            for parent in field.parents() {
                if *parent == field.id {
                    violations.push(SchemaViolation::SelfReference(field.id.clone()));
                } else if !seen.contains(parent.as_str()) {
                    violations.push(SchemaViolation::DanglingParent {
                        field: field.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        violations
    }

    /// Problems worth showing the form's author that do not stop the form
    /// from running. A field whose length bounds are inverted simply rejects
    /// every non-empty value.
    pub fn warnings(&self) -> Vec<SchemaViolation> {
        self.fields
            .iter()
            .filter_map(|field| {
                let validation = field.validation.as_ref()?;
                match (validation.min_length, validation.max_length) {
                    (Some(min), Some(max)) if max < min => {
                        Some(SchemaViolation::LengthBoundsInverted {
                            field: field.id.clone(),
                            min,
                            max,
                        })
                    }
                    _ => None,
                }
            })
            .collect()
    }

    /// Check id uniqueness, parent references and choice options.
    pub fn is_structurally_sound(&self) -> Result<(), SchemaError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { violations })
        }
    }
}

/// Free-function form of [`FormSchema::is_structurally_sound`].
pub fn is_structurally_sound(schema: &FormSchema) -> Result<(), SchemaError> {
    schema.is_structurally_sound()
}
