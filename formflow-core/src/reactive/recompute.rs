//! Derived Value Evaluator
//!
//! Recomputes derived fields in topological order. Each field is in one of
//! three outcomes after a pass:
//!
//! - **pending**: some parent is unset, so the field is left unset and no
//!   error is raised
//! - **failed**: the formula errored or produced a non-scalar; the field is
//!   set to the empty string and a [`FormulaError`] is recorded for it
//! - **computed**: the result replaces the old value, but only when it
//!   differs, so an unchanged result never shows up as a change
//!
//! A failure in one field never stops the rest of the pass.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::FormulaError;
use crate::formula::{Bindings, FormulaEvaluator};
use crate::graph::DependencyGraph;
use crate::schema::{FieldId, FieldValue, FormSchema, Values};

/// Result of one recompute pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recomputation {
    pub values: Values,

    /// Formula failures of the fields evaluated in this pass.
    pub formula_errors: IndexMap<FieldId, FormulaError>,

    /// Fields whose value was set, replaced or unset by this pass, in
    /// evaluation order.
    pub changed: Vec<FieldId>,
}

/// Recomputes derived fields against one schema and graph.
pub struct DerivedEvaluator<'a> {
    schema: &'a FormSchema,
    graph: &'a DependencyGraph,
    formulas: &'a dyn FormulaEvaluator,
    blank_parent_is_pending: bool,
}

impl<'a> DerivedEvaluator<'a> {
    pub fn new(
        schema: &'a FormSchema,
        graph: &'a DependencyGraph,
        formulas: &'a dyn FormulaEvaluator,
        config: &EngineConfig,
    ) -> Self {
        Self {
            schema,
            graph,
            formulas,
            blank_parent_is_pending: config.blank_parent_is_pending,
        }
    }

    /// Recompute every ordered derived field.
    pub fn recompute_all(&self, values: Values) -> Recomputation {
        let targets: Vec<FieldId> = self.graph.topological_order().cloned().collect();
        self.recompute_fields(values, &targets)
    }

    /// Recompute `targets`, which must already be in topological order.
    pub fn recompute_fields(&self, mut values: Values, targets: &[FieldId]) -> Recomputation {
        let mut formula_errors = IndexMap::new();
        let mut changed = Vec::new();

        for id in targets {
            let Some(derived) = self.schema.field(id.as_str()).and_then(|f| f.derived.as_ref())
            else {
                continue;
            };

            let Some(bindings) = self.bind_parents(&derived.parents, &values) else {
                trace!(field = %id, "derived field pending");
                if values.shift_remove(id.as_str()).is_some() {
                    changed.push(id.clone());
                }
                continue;
            };

            let next = match self
                .formulas
                .evaluate(&derived.formula, &bindings)
                .and_then(|value| {
                    if value.is_scalar() {
                        Ok(value)
                    } else {
                        Err(FormulaError::NonScalar)
                    }
                }) {
                Ok(value) => value,
                Err(err) => {
                    debug!(field = %id, error = %err, "formula failed");
                    formula_errors.insert(id.clone(), err);
                    FieldValue::Text(String::new())
                }
            };

            if values.get(id.as_str()) != Some(&next) {
                values.insert(id.clone(), next);
                changed.push(id.clone());
            }
        }

        debug!(
            evaluated = targets.len(),
            changed = changed.len(),
            failed = formula_errors.len(),
            "recompute pass finished"
        );

        Recomputation {
            values,
            formula_errors,
            changed,
        }
    }

    /// Bind every parent by id, or `None` if any parent is pending.
    fn bind_parents(&self, parents: &[FieldId], values: &Values) -> Option<Bindings> {
        let mut bindings = Bindings::with_capacity(parents.len());
        for parent in parents {
            let value = values.get(parent.as_str())?;
            if self.blank_parent_is_pending && value.is_blank() {
                return None;
            }
            bindings.insert(parent.as_str().to_string(), value.clone());
        }
        Some(bindings)
    }
}

/// Recompute every derived field of `schema` with the default config.
pub fn recompute(
    schema: &FormSchema,
    graph: &DependencyGraph,
    values: &Values,
    formulas: &dyn FormulaEvaluator,
) -> Recomputation {
    DerivedEvaluator::new(schema, graph, formulas, &EngineConfig::default())
        .recompute_all(values.clone())
}
