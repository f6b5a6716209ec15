//! Formula Evaluation
//!
//! Derived fields compute their value by evaluating a formula string. The
//! engine only talks to the [`FormulaEvaluator`] trait; [`SandboxEvaluator`]
//! is the built-in implementation.
//!
//! # Architecture
//!
//! 1. The formula source is parsed once into an [`Expr`] tree and cached
//! 2. Each evaluation binds the derived field's parents by name
//! 3. The tree is interpreted in a [`Scope`] that exposes only those names,
//!    the builtin functions and the clock
//!
//! Nothing outside the bindings is reachable from a formula, and no
//! evaluation can write anywhere.

mod ast;
mod clock;
mod eval;
mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use clock::{Clock, FixedClock, SystemClock};
pub use eval::{Scope, PARENTS};
pub use parser::parse;

use crate::config::FormulaLimits;
use crate::error::FormulaError;
use crate::schema::FieldValue;

/// Parent values bound by name, in declared parent order.
pub type Bindings = IndexMap<String, FieldValue>;

/// Host-side formula evaluation.
///
/// Implementations must treat `bindings` as the only inputs a formula can
/// read and must not reach engine state.
pub trait FormulaEvaluator: Send + Sync {
    fn evaluate(&self, formula: &str, bindings: &Bindings) -> Result<FieldValue, FormulaError>;
}

/// A parsed formula, ready to run against any bindings.
#[derive(Debug, Clone)]
pub struct CompiledFormula {
    expr: Arc<Expr>,
}

impl CompiledFormula {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Names the formula reads. `parents` is reported like any other name.
    pub fn references(&self) -> Vec<&str> {
        self.expr.references()
    }

    pub fn run(&self, bindings: &Bindings, clock: &dyn Clock) -> Result<FieldValue, FormulaError> {
        Scope::new(bindings, clock).eval(&self.expr)
    }
}

/// The built-in sandboxed evaluator.
///
/// Parsed formulas are cached by source text, so recomputing a form only
/// parses each distinct formula once.
#[derive(Debug)]
pub struct SandboxEvaluator {
    limits: FormulaLimits,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<String, CompiledFormula>>,
}

impl Default for SandboxEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl SandboxEvaluator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, FormulaLimits::default())
    }

    pub fn with_limits(clock: Arc<dyn Clock>, limits: FormulaLimits) -> Self {
        Self {
            limits,
            clock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Parse `formula`, or fetch it from the cache.
    pub fn compile(&self, formula: &str) -> Result<CompiledFormula, FormulaError> {
        if let Some(compiled) = self.cache.read().get(formula) {
            return Ok(compiled.clone());
        }

        let compiled = CompiledFormula {
            expr: Arc::new(parse(formula, &self.limits)?),
        };
        trace!(formula, "compiled formula");
        self.cache
            .write()
            .insert(formula.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Check that `formula` parses and reads only the given names
    /// (or `parents`).
    pub fn check(&self, formula: &str, parents: &[&str]) -> Result<(), FormulaError> {
        let compiled = self.compile(formula)?;
        match compiled
            .references()
            .into_iter()
            .find(|name| *name != PARENTS && !parents.contains(name))
        {
            Some(unknown) => Err(FormulaError::UnknownName(unknown.to_string())),
            None => Ok(()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl FormulaEvaluator for SandboxEvaluator {
    fn evaluate(&self, formula: &str, bindings: &Bindings) -> Result<FieldValue, FormulaError> {
        self.compile(formula)?.run(bindings, self.clock.as_ref())
    }
}
