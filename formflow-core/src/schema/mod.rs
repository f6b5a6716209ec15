//! Field Model
//!
//! Pure data: fields, their rule specs, form schemas and the values a form
//! holds. The only behavior here is structural checking
//! ([`is_valid_options`], [`FormSchema::is_structurally_sound`]).

mod field;
mod form;
mod value;

pub use field::{is_valid_options, DerivedSpec, Field, FieldId, FieldType, ValidationSpec};
pub use form::{is_structurally_sound, FormSchema};
pub use value::{format_number, FieldValue, Values};
