//! Fields
//!
//! The typed description of a single form input.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FieldValue;

/// Stable identifier of a field within a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The closed set of input kinds a form can contain.
///
/// Persisted with the builder's short tokens; the descriptive names are
/// accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "text", alias = "short-text")]
    ShortText,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "textarea", alias = "long-text")]
    LongText,
    #[serde(rename = "select", alias = "single-select")]
    SingleSelect,
    #[serde(rename = "radio", alias = "single-choice-group")]
    SingleChoiceGroup,
    #[serde(rename = "checkbox", alias = "multi-choice-group")]
    MultiChoiceGroup,
    #[serde(rename = "date")]
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::ShortText,
        FieldType::Number,
        FieldType::LongText,
        FieldType::SingleSelect,
        FieldType::SingleChoiceGroup,
        FieldType::MultiChoiceGroup,
        FieldType::Date,
    ];

    /// Types whose value is picked from `options`.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            FieldType::SingleSelect | FieldType::SingleChoiceGroup | FieldType::MultiChoiceGroup
        )
    }

    /// Types whose value is a list of selected options.
    pub fn is_multi(self) -> bool {
        self == FieldType::MultiChoiceGroup
    }
}

/// Declarative rules checked by the validation engine.
///
/// `max_length >= min_length` is expected when both are set; the model does
/// not enforce it, [`FormSchema::warnings`](super::FormSchema::warnings)
/// reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, alias = "email")]
    pub requires_email_format: bool,

    #[serde(default, alias = "passwordRule")]
    pub requires_password_rule: bool,
}

impl ValidationSpec {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// How a derived field computes its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSpec {
    /// Fields the formula reads, in the order `parents[i]` indexes them.
    pub parents: Vec<FieldId>,
    pub formula: String,
}

impl DerivedSpec {
    pub fn new<I, S>(parents: I, formula: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldId>,
    {
        Self {
            parents: parents.into_iter().map(Into::into).collect(),
            formula: formula.into(),
        }
    }
}

/// One input of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedSpec>,
}

impl Field {
    /// A bare field with the given id and type and no rules.
    pub fn new(id: impl Into<FieldId>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            required: false,
            default_value: None,
            options: Vec::new(),
            validation: None,
            derived: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn derived_from(mut self, derived: DerivedSpec) -> Self {
        self.derived = Some(derived);
        self
    }

    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    pub fn parents(&self) -> &[FieldId] {
        self.derived.as_ref().map_or(&[], |d| d.parents.as_slice())
    }
}

/// Choice fields need at least one option and no repeats; other types
/// always pass.
pub fn is_valid_options(field: &Field) -> bool {
    if !field.field_type.is_choice() {
        return true;
    }
    let mut seen = HashSet::new();
    !field.options.is_empty() && field.options.iter().all(|o| seen.insert(o.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_types() {
        assert!(FieldType::SingleSelect.is_choice());
        assert!(FieldType::MultiChoiceGroup.is_multi());
        assert!(!FieldType::Date.is_choice());
        assert_eq!(FieldType::ALL.iter().filter(|t| t.is_choice()).count(), 3);
    }

    #[test]
    fn options_check() {
        let radio = Field::new("r", FieldType::SingleChoiceGroup, "Pick");
        assert!(!is_valid_options(&radio));

        let radio = radio.with_options(["a", "b"]);
        assert!(is_valid_options(&radio));

        let repeated = Field::new("r", FieldType::SingleSelect, "Pick").with_options(["a", "a"]);
        assert!(!is_valid_options(&repeated));

        assert!(is_valid_options(&Field::new("t", FieldType::ShortText, "Name")));
    }

    #[test]
    fn persisted_layout_omits_absent_properties() {
        let field = Field::new("name", FieldType::ShortText, "Name").required();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "name",
                "type": "text",
                "label": "Name",
                "required": true,
            })
        );
    }

    #[test]
    fn reads_legacy_and_descriptive_keys() {
        let field: Field = serde_json::from_str(
            r#"{
                "id": "pw",
                "type": "short-text",
                "label": "Password",
                "required": false,
                "validation": { "minLength": 8, "passwordRule": true, "email": false }
            }"#,
        )
        .unwrap();
        assert_eq!(field.field_type, FieldType::ShortText);
        let validation = field.validation.unwrap();
        assert_eq!(validation.min_length, Some(8));
        assert!(validation.requires_password_rule);
        assert!(!validation.requires_email_format);
    }
}
