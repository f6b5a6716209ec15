//! Recompute Coordinator
//!
//! Turns one edit into a new [`Snapshot`]. The coordinator holds the schema,
//! its dependency graph and the formula evaluator, but never a snapshot:
//! callers pass the current one in and get a fresh one back.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{CycleError, FormulaError, SchemaError, SessionError, SubmitError};
use crate::formula::FormulaEvaluator;
use crate::graph::{DependencyGraph, Resolution};
use crate::reactive::recompute::{DerivedEvaluator, Recomputation};
use crate::schema::{FieldId, FieldValue, FormSchema, Values};
use crate::validation::{ValidationError, Validator};

/// The `(values, errors)` pair handed to the view layer after every edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub values: Values,

    /// Validation failures of the fields touched so far.
    pub errors: IndexMap<FieldId, ValidationError>,

    /// Derived fields whose formula failed on their last evaluation.
    pub formula_errors: IndexMap<FieldId, FormulaError>,
}

impl Snapshot {
    pub fn value(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    pub fn error(&self, id: &str) -> Option<&ValidationError> {
        self.errors.get(id)
    }

    pub fn formula_error(&self, id: &str) -> Option<&FormulaError> {
        self.formula_errors.get(id)
    }
}

pub struct Coordinator {
    schema: FormSchema,
    graph: DependencyGraph,
    formulas: Arc<dyn FormulaEvaluator>,
    validator: Validator,
    config: EngineConfig,
}

impl Coordinator {
    pub fn new(schema: FormSchema, formulas: Arc<dyn FormulaEvaluator>) -> Result<Self, SchemaError> {
        Self::with_config(schema, formulas, EngineConfig::default())
    }

    /// Check the schema and build its graph.
    ///
    /// A cycle does not fail construction: fields on or behind the cycle are
    /// never evaluated, every other derived field still is. [`Self::cycle`]
    /// reports it.
    pub fn with_config(
        schema: FormSchema,
        formulas: Arc<dyn FormulaEvaluator>,
        config: EngineConfig,
    ) -> Result<Self, SchemaError> {
        schema.is_structurally_sound()?;
        for warning in schema.warnings() {
            warn!(form = %schema.name, field = %warning.field_id(), "{warning}");
        }

        let graph = DependencyGraph::build_lenient(&schema);
        if let Some(cycle) = graph.cycle() {
            warn!(form = %schema.name, %cycle, "form has unusable derived fields");
        }

        Ok(Self {
            validator: Validator::new(&config),
            schema,
            graph,
            formulas,
            config,
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cycle(&self) -> Option<&CycleError> {
        self.graph.cycle()
    }

    /// Derived fields that will never be computed because of a cycle.
    pub fn unresolved(&self) -> Vec<&FieldId> {
        self.schema
            .derived_fields()
            .filter(|f| {
                matches!(
                    self.graph.resolution(f.id.as_str()),
                    Some(Resolution::Cyclic | Resolution::Blocked)
                )
            })
            .map(|f| &f.id)
            .collect()
    }

    fn evaluator(&self) -> DerivedEvaluator<'_> {
        DerivedEvaluator::new(&self.schema, &self.graph, self.formulas.as_ref(), &self.config)
    }

    /// The snapshot of an untouched form.
    ///
    /// Non-derived fields start from their non-blank defaults, then every
    /// derived field is computed. Nothing is validated yet.
    pub fn initial_snapshot(&self) -> Snapshot {
        let values: Values = self
            .schema
            .fields
            .iter()
            .filter(|f| !f.is_derived())
            .filter_map(|f| {
                f.default_value
                    .as_ref()
                    .filter(|v| !v.is_blank())
                    .map(|v| (f.id.clone(), v.clone()))
            })
            .collect();

        let Recomputation {
            values,
            formula_errors,
            ..
        } = self.evaluator().recompute_all(values);

        Snapshot {
            values,
            errors: IndexMap::new(),
            formula_errors,
        }
    }

    /// Apply one edit: store it, recompute everything downstream of `id`,
    /// then re-validate `id` and every field whose value changed.
    ///
    /// `None` unsets the field.
    pub fn set_value(
        &self,
        snapshot: &Snapshot,
        id: &str,
        value: Option<FieldValue>,
    ) -> Result<Snapshot, SessionError> {
        let Some(field) = self.schema.field(id) else {
            return Err(SessionError::UnknownField(FieldId::from(id)));
        };

        let mut values = snapshot.values.clone();
        match value {
            Some(value) => {
                values.insert(field.id.clone(), value);
            }
            None => {
                values.shift_remove(id);
            }
        }

        let targets = self.graph.downstream(id);
        let pass = self.evaluator().recompute_fields(values, &targets);
        debug!(
            field = id,
            downstream = targets.len(),
            changed = pass.changed.len(),
            "applied edit"
        );

        let mut errors = snapshot.errors.clone();
        let touched = std::iter::once(&field.id).chain(pass.changed.iter());
        for touched_id in touched {
            let Some(touched_field) = self.schema.field(touched_id.as_str()) else {
                continue;
            };
            match self
                .validator
                .validate(touched_field, pass.values.get(touched_id.as_str()))
            {
                Some(err) => {
                    errors.insert(touched_id.clone(), err);
                }
                None => {
                    errors.shift_remove(touched_id.as_str());
                }
            }
        }

        let mut formula_errors = snapshot.formula_errors.clone();
        for target in &targets {
            formula_errors.shift_remove(target.as_str());
        }
        formula_errors.extend(pass.formula_errors);

        Ok(Snapshot {
            values: pass.values,
            errors,
            formula_errors,
        })
    }

    /// Validate every field of the form.
    pub fn validate_all(&self, snapshot: &Snapshot) -> IndexMap<FieldId, ValidationError> {
        self.validator.validate_all(&self.schema, &snapshot.values)
    }

    /// Validate every field; fails with the full error set if any field fails.
    pub fn submit(&self, snapshot: &Snapshot) -> Result<(), SubmitError> {
        let errors = self.validate_all(snapshot);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SubmitError { errors })
        }
    }
}
