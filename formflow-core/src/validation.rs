//! Validation Engine
//!
//! Checks a field's current value against its declared rules. Rules run in
//! a fixed order and the first failure wins:
//!
//! 1. required
//! 2. minimum length
//! 3. maximum length
//! 4. email format
//! 5. password rule (at least 8 characters, at least one digit)
//!
//! Length rules measure characters for text and entries for multi-choice
//! lists. Format rules only look at non-empty scalar values. The engine is
//! stateless; the same `(field, value)` always gives the same verdict.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::schema::{Field, FieldId, FieldValue, FormSchema, Values};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

const PASSWORD_MIN_CHARS: usize = 8;

/// Which rule rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rule {
    Required,
    MinLength,
    MaxLength,
    EmailFormat,
    PasswordRule,
}

/// A rule failure. Returned as data, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ValidationError {
    pub field_id: FieldId,
    pub rule: Rule,
    pub message: String,
}

impl ValidationError {
    fn new(field: &Field, rule: Rule, message: impl Into<String>) -> Self {
        Self {
            field_id: field.id.clone(),
            rule,
            message: message.into(),
        }
    }
}

/// Rule evaluator configured from an [`EngineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    trim_required: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Validator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            trim_required: config.trim_required,
        }
    }

    /// Validate one value. `None` means the field is unset.
    pub fn validate(&self, field: &Field, value: Option<&FieldValue>) -> Option<ValidationError> {
        let empty = match value {
            None => true,
            Some(v) if self.trim_required => v.is_blank(),
            Some(v) => v.is_empty(),
        };
        if field.required && empty {
            return Some(ValidationError::new(
                field,
                Rule::Required,
                "This field is required",
            ));
        }

        let (Some(spec), Some(value)) = (&field.validation, value) else {
            return None;
        };

        if let Some(len) = value.length() {
            if let Some(min) = spec.min_length {
                if len < min as usize {
                    return Some(ValidationError::new(
                        field,
                        Rule::MinLength,
                        format!("Minimum length is {min}"),
                    ));
                }
            }
            if let Some(max) = spec.max_length {
                if len > max as usize {
                    return Some(ValidationError::new(
                        field,
                        Rule::MaxLength,
                        format!("Maximum length is {max}"),
                    ));
                }
            }
        }

        if !value.is_scalar() || value.is_empty() {
            return None;
        }
        let text = value.to_string();

        if spec.requires_email_format && !EMAIL.is_match(&text) {
            return Some(ValidationError::new(
                field,
                Rule::EmailFormat,
                "Invalid email format",
            ));
        }

        if spec.requires_password_rule && !is_strong_password(&text) {
            return Some(ValidationError::new(
                field,
                Rule::PasswordRule,
                "Password must be at least 8 characters and contain a number",
            ));
        }

        None
    }

    /// Validate every field of a schema against `values`.
    ///
    /// Only failing fields appear in the result, in schema order.
    pub fn validate_all(
        &self,
        schema: &FormSchema,
        values: &Values,
    ) -> IndexMap<FieldId, ValidationError> {
        schema
            .fields
            .iter()
            .filter_map(|field| {
                self.validate(field, values.get(field.id.as_str()))
                    .map(|err| (field.id.clone(), err))
            })
            .collect()
    }
}

fn is_strong_password(text: &str) -> bool {
    text.chars().count() >= PASSWORD_MIN_CHARS
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Validate one value with the default configuration.
pub fn validate(field: &Field, value: Option<&FieldValue>) -> Option<ValidationError> {
    Validator::default().validate(field, value)
}

/// Validate a whole form with the default configuration.
pub fn validate_all(schema: &FormSchema, values: &Values) -> IndexMap<FieldId, ValidationError> {
    Validator::default().validate_all(schema, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, ValidationSpec};
    use chrono::Utc;

    fn text_field(spec: ValidationSpec) -> Field {
        Field::new("f", FieldType::ShortText, "F").with_validation(spec)
    }

    fn rule_of(field: &Field, value: FieldValue) -> Option<Rule> {
        validate(field, Some(&value)).map(|e| e.rule)
    }

    #[test]
    fn required_rejects_empty_values() {
        let field = Field::new("name", FieldType::ShortText, "Name").required();
        assert_eq!(validate(&field, None).unwrap().rule, Rule::Required);
        assert_eq!(rule_of(&field, FieldValue::text("")), Some(Rule::Required));
        assert_eq!(rule_of(&field, FieldValue::List(vec![])), Some(Rule::Required));
        assert_eq!(rule_of(&field, FieldValue::text("x")), None);
        assert_eq!(rule_of(&field, FieldValue::Bool(false)), None);
        assert_eq!(rule_of(&field, FieldValue::Number(0.0)), None);
    }

    #[test]
    fn whitespace_only_depends_on_config() {
        let field = Field::new("name", FieldType::ShortText, "Name").required();
        assert_eq!(rule_of(&field, FieldValue::text("   ")), Some(Rule::Required));

        let lenient = Validator::new(&EngineConfig {
            trim_required: false,
            ..EngineConfig::default()
        });
        assert!(lenient
            .validate(&field, Some(&FieldValue::text("   ")))
            .is_none());
    }

    #[test]
    fn satisfied_min_length_passes() {
        let field = text_field(ValidationSpec {
            min_length: Some(1),
            ..ValidationSpec::default()
        })
        .required();
        assert_eq!(rule_of(&field, FieldValue::text("x")), None);
    }

    #[test]
    fn length_bounds() {
        let field = text_field(ValidationSpec {
            min_length: Some(2),
            max_length: Some(4),
            ..ValidationSpec::default()
        });
        let err = validate(&field, Some(&FieldValue::text("a"))).unwrap();
        assert_eq!(err.rule, Rule::MinLength);
        assert_eq!(err.message, "Minimum length is 2");
        let err = validate(&field, Some(&FieldValue::text("abcde"))).unwrap();
        assert_eq!(err.message, "Maximum length is 4");
        assert_eq!(rule_of(&field, FieldValue::text("abc")), None);
    }

    #[test]
    fn zero_max_length_admits_only_empty_values() {
        let field = text_field(ValidationSpec {
            min_length: Some(0),
            max_length: Some(0),
            ..ValidationSpec::default()
        });
        assert_eq!(rule_of(&field, FieldValue::text("abc")), Some(Rule::MaxLength));
        assert_eq!(rule_of(&field, FieldValue::text("")), None);
    }

    #[test]
    fn multi_choice_measured_by_selection_count() {
        let field = Field::new("tags", FieldType::MultiChoiceGroup, "Tags")
            .with_options(["alpha", "beta", "gamma"])
            .with_validation(ValidationSpec {
                max_length: Some(2),
                ..ValidationSpec::default()
            });
        let two = FieldValue::List(vec!["alpha".into(), "gamma".into()]);
        let three = FieldValue::List(vec!["alpha".into(), "beta".into(), "gamma".into()]);
        assert_eq!(rule_of(&field, two), None);
        assert_eq!(rule_of(&field, three), Some(Rule::MaxLength));
    }

    #[test]
    fn length_error_precedes_email_error() {
        let field = text_field(ValidationSpec {
            min_length: Some(10),
            requires_email_format: true,
            ..ValidationSpec::default()
        });
        assert_eq!(rule_of(&field, FieldValue::text("a@b")), Some(Rule::MinLength));
    }

    #[test]
    fn email_format() {
        let field = text_field(ValidationSpec {
            requires_email_format: true,
            ..ValidationSpec::default()
        });
        assert_eq!(rule_of(&field, FieldValue::text("ada@example.org")), None);
        assert_eq!(rule_of(&field, FieldValue::text("ada@example")), Some(Rule::EmailFormat));
        assert_eq!(rule_of(&field, FieldValue::text("a da@x.io")), Some(Rule::EmailFormat));
        // Optional and empty: format rules do not apply.
        assert!(validate(&field, Some(&FieldValue::text(""))).is_none());
    }

    #[test]
    fn password_rule() {
        let field = text_field(ValidationSpec {
            requires_password_rule: true,
            ..ValidationSpec::default()
        });
        assert_eq!(rule_of(&field, FieldValue::text("abcdefg1")), None);
        assert_eq!(rule_of(&field, FieldValue::text("abcdefgh")), Some(Rule::PasswordRule));
        assert_eq!(rule_of(&field, FieldValue::text("abc1")), Some(Rule::PasswordRule));
        // Line breaks count like any other character.
        assert_eq!(rule_of(&field, FieldValue::text("abcdef1\n")), None);
        assert_eq!(rule_of(&field, FieldValue::text("abcde1\r\n")), None);
    }

    #[test]
    fn validation_is_deterministic() {
        let field = text_field(ValidationSpec {
            requires_email_format: true,
            ..ValidationSpec::default()
        });
        let value = FieldValue::text("nope");
        assert_eq!(validate(&field, Some(&value)), validate(&field, Some(&value)));
    }

    #[test]
    fn validate_all_collects_in_schema_order() {
        let schema = FormSchema::new(
            "f",
            Utc::now(),
            vec![
                Field::new("b", FieldType::ShortText, "B").required(),
                Field::new("a", FieldType::ShortText, "A").required(),
                Field::new("c", FieldType::ShortText, "C"),
            ],
        );
        let mut values = Values::new();
        values.insert(FieldId::from("c"), FieldValue::text("ok"));

        let errors = validate_all(&schema, &values);
        let ids: Vec<_> = errors.keys().map(FieldId::as_str).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
