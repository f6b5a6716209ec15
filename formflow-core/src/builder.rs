//! Form Builder
//!
//! The in-progress field list a form author edits before saving. Saving
//! appends the finished form to a [`SchemaStore`] and starts over with an
//! empty list; loading a saved form brings its fields back for editing.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::BuilderError;
use crate::formula::Clock;
use crate::schema::{DerivedSpec, Field, FieldId, FieldType, FieldValue, FormSchema, ValidationSpec};
use crate::store::SchemaStore;

const NEW_FIELD_LABEL: &str = "New Field";
const DEFAULT_OPTIONS: [&str; 2] = ["Option 1", "Option 2"];

/// One property change of an in-progress field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Type(FieldType),
    Label(String),
    Required(bool),
    DefaultValue(Option<FieldValue>),
    Validation(Option<ValidationSpec>),
    Options(Vec<String>),
    Derived(Option<DerivedSpec>),
}

/// Identity of the saved form a builder was loaded from.
#[derive(Debug, Clone, PartialEq)]
struct Origin {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct FormBuilder {
    fields: Vec<Field>,
    origin: Option<Origin>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id.as_str() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the list came from a saved form.
    pub fn is_loaded(&self) -> bool {
        self.origin.is_some()
    }

    /// Append a fresh field of `field_type` and return its generated id.
    pub fn add_field(&mut self, field_type: FieldType) -> FieldId {
        let mut field = Field::new(FieldId::generate(), field_type, NEW_FIELD_LABEL);
        if field_type.is_choice() {
            field.options = DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect();
        }
        let id = field.id.clone();
        debug!(field = %id, ?field_type, "added field");
        self.fields.push(field);
        id
    }

    /// Append a fully built field as is.
    pub fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn update_field(&mut self, id: &str, update: FieldUpdate) -> Result<(), BuilderError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id.as_str() == id)
            .ok_or_else(|| BuilderError::UnknownField(FieldId::from(id)))?;

        match update {
            FieldUpdate::Type(field_type) => field.field_type = field_type,
            FieldUpdate::Label(label) => field.label = label,
            FieldUpdate::Required(required) => field.required = required,
            FieldUpdate::DefaultValue(value) => field.default_value = value,
            FieldUpdate::Validation(spec) => field.validation = spec.filter(|s| !s.is_empty()),
            FieldUpdate::Options(options) => field.options = options,
            FieldUpdate::Derived(derived) => field.derived = derived,
        }
        Ok(())
    }

    /// Move the field at `from` to position `to`.
    ///
    /// A target outside the list leaves the order unchanged.
    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), BuilderError> {
        let len = self.fields.len();
        if from >= len {
            return Err(BuilderError::PositionOutOfRange { index: from, len });
        }
        if to >= len {
            return Ok(());
        }
        let field = self.fields.remove(from);
        self.fields.insert(to, field);
        Ok(())
    }

    pub fn swap_fields(&mut self, a: usize, b: usize) -> Result<(), BuilderError> {
        let len = self.fields.len();
        if let Some(index) = [a, b].into_iter().find(|i| *i >= len) {
            return Err(BuilderError::PositionOutOfRange { index, len });
        }
        self.fields.swap(a, b);
        Ok(())
    }

    pub fn remove_field(&mut self, id: &str) -> Result<Field, BuilderError> {
        let position = self
            .fields
            .iter()
            .position(|f| f.id.as_str() == id)
            .ok_or_else(|| BuilderError::UnknownField(FieldId::from(id)))?;
        Ok(self.fields.remove(position))
    }

    /// Replace the in-progress list with a saved form's fields.
    pub fn load(&mut self, schema: &FormSchema) {
        self.fields = schema.fields.clone();
        self.origin = Some(Origin {
            name: schema.name.clone(),
            created_at: schema.created_at,
        });
    }

    /// Drop the in-progress list without saving.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.origin = None;
    }

    /// Save the in-progress form under `name` and start over.
    ///
    /// A new form is appended to the stored collection with `createdAt`
    /// stamped. A loaded form replaces its stored entry, keeps its
    /// `createdAt` and gets `updatedAt` stamped; if that entry is gone it is
    /// appended again.
    pub fn save(
        &mut self,
        name: &str,
        store: &dyn SchemaStore,
        clock: &dyn Clock,
    ) -> Result<FormSchema, BuilderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BuilderError::EmptyName);
        }
        if self.fields.is_empty() {
            return Err(BuilderError::NoFields);
        }

        let now = clock.now();
        let mut schemas = store.load_schemas()?;

        let existing = self.origin.as_ref().and_then(|origin| {
            schemas
                .iter()
                .position(|s| s.name == origin.name && s.created_at == origin.created_at)
        });

        let schema = match (&self.origin, existing) {
            (Some(origin), Some(index)) => {
                let mut schema = FormSchema::new(name, origin.created_at, self.fields.clone());
                schema.updated_at = Some(now);
                schemas[index] = schema.clone();
                schema
            }
            (Some(origin), None) => {
                let mut schema = FormSchema::new(name, origin.created_at, self.fields.clone());
                schema.updated_at = Some(now);
                schemas.push(schema.clone());
                schema
            }
            (None, _) => {
                let schema = FormSchema::new(name, now, self.fields.clone());
                schemas.push(schema.clone());
                schema
            }
        };

        store.save_schemas(&schemas)?;
        info!(form = %schema.name, fields = schema.fields.len(), "saved form");
        self.clear();
        Ok(schema)
    }
}
