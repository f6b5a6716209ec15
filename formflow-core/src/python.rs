//! Python bindings.
//!
//! Values cross the boundary as JSON text so the Python side can use plain
//! `json.loads`/`json.dumps`.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use serde::Serialize;

use crate::reactive::FormSession;
use crate::schema::{FieldValue, FormSchema};

fn to_json<T: Serialize + ?Sized>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Python-exposed form session.
#[pyclass(name = "FormSession")]
pub struct PyFormSession {
    inner: FormSession,
}

#[pymethods]
impl PyFormSession {
    /// Start a session from a form schema in its persisted JSON layout.
    #[new]
    fn new(schema_json: &str) -> PyResult<Self> {
        let schema: FormSchema = serde_json::from_str(schema_json).map_err(value_error)?;
        let inner = FormSession::new(schema).map_err(value_error)?;
        Ok(Self { inner })
    }

    /// Set a field from a JSON value and return the new snapshot as JSON.
    fn set_value(&mut self, field_id: &str, value_json: &str) -> PyResult<String> {
        let value: FieldValue = serde_json::from_str(value_json).map_err(value_error)?;
        let snapshot = self.inner.set_value(field_id, value).map_err(value_error)?;
        to_json(snapshot)
    }

    fn clear_value(&mut self, field_id: &str) -> PyResult<String> {
        let snapshot = self.inner.clear_value(field_id).map_err(value_error)?;
        to_json(snapshot)
    }

    /// Validate every field. Returns the submission as JSON, or raises
    /// `ValueError` carrying the JSON error map.
    fn submit(&mut self) -> PyResult<String> {
        match self.inner.submit() {
            Ok(submission) => to_json(&submission),
            Err(err) => Err(PyValueError::new_err(to_json(&err.errors)?)),
        }
    }

    #[getter]
    fn values(&self) -> PyResult<String> {
        to_json(self.inner.values())
    }

    #[getter]
    fn errors(&self) -> PyResult<String> {
        to_json(&self.inner.snapshot().errors)
    }

    #[getter]
    fn formula_errors(&self) -> PyResult<String> {
        to_json(&self.inner.snapshot().formula_errors)
    }

    fn progress(&self) -> f64 {
        self.inner.progress()
    }

    fn __repr__(&self) -> String {
        format!(
            "FormSession(form={:?}, fields={}, values={})",
            self.inner.schema().name,
            self.inner.schema().fields.len(),
            self.inner.values().len()
        )
    }
}
