//! Formula Interpreter
//!
//! Evaluates a parsed [`Expr`] against an explicit set of bindings. The
//! scope is the whole world a formula can see: the bound parent values, the
//! builtin functions below and the clock. There is no access to engine
//! state and no way to write anything.
//!
//! # Coercions
//!
//! - `+` adds when both sides are numbers or booleans, otherwise it
//!   concatenates the display forms.
//! - `- * / %`, unary `-` and the numeric builtins read text as a number
//!   when it parses as one; anything else is a type error.
//! - Comparisons are numeric when both sides read as numbers, textual
//!   otherwise.
//! - Division or modulo by zero is an error, not infinity.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, NaiveDate};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::clock::Clock;
use super::Bindings;
use crate::error::FormulaError;
use crate::schema::{format_number, FieldValue};

/// Name that exposes the bound parents positionally, as `parents[i]`.
pub const PARENTS: &str = "parents";

/// Evaluation scope of one formula run.
pub struct Scope<'a> {
    bindings: &'a Bindings,
    clock: &'a dyn Clock,
}

impl<'a> Scope<'a> {
    pub fn new(bindings: &'a Bindings, clock: &'a dyn Clock) -> Self {
        Self { bindings, clock }
    }

    pub fn eval(&self, expr: &Expr) -> Result<FieldValue, FormulaError> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),

            Expr::Load(name) => self.load(name),

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => Ok(FieldValue::Number(-to_number(&value)?)),
                    UnaryOp::Not => Ok(FieldValue::Bool(!truthy(&value))),
                }
            }

            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),

            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(condition)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }

            Expr::Call { function, args } => self.call(function, args),

            Expr::Index { target, index } => self.index(target, index),
        }
    }

    fn load(&self, name: &str) -> Result<FieldValue, FormulaError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        if name == PARENTS {
            return Ok(FieldValue::List(
                self.bindings.values().map(|v| v.to_string()).collect(),
            ));
        }
        Err(FormulaError::UnknownName(name.to_string()))
    }

    fn index(&self, target: &Expr, index: &Expr) -> Result<FieldValue, FormulaError> {
        let position = to_index(&self.eval(index)?)?;

        if matches!(target, Expr::Load(name) if name == PARENTS && !self.bindings.contains_key(PARENTS))
        {
            let len = self.bindings.len();
            return usize::try_from(position)
                .ok()
                .and_then(|i| self.bindings.get_index(i))
                .map(|(_, value)| value.clone())
                .ok_or(FormulaError::IndexOutOfRange {
                    index: position,
                    len,
                });
        }

        match self.eval(target)? {
            FieldValue::List(items) => {
                let len = items.len();
                usize::try_from(position)
                    .ok()
                    .and_then(|i| items.into_iter().nth(i))
                    .map(FieldValue::Text)
                    .ok_or(FormulaError::IndexOutOfRange {
                        index: position,
                        len,
                    })
            }
            other => Err(FormulaError::Type(format!("cannot index into `{other}`"))),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<FieldValue, FormulaError> {
        // Logic short-circuits, so the right side is evaluated lazily.
        match op {
            BinaryOp::And => {
                let result = truthy(&self.eval(lhs)?) && truthy(&self.eval(rhs)?);
                return Ok(FieldValue::Bool(result));
            }
            BinaryOp::Or => {
                let result = truthy(&self.eval(lhs)?) || truthy(&self.eval(rhs)?);
                return Ok(FieldValue::Bool(result));
            }
            _ => {}
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;

        let value = match op {
            BinaryOp::Add => match (&l, &r) {
                (FieldValue::Number(_) | FieldValue::Bool(_), FieldValue::Number(_) | FieldValue::Bool(_)) => {
                    FieldValue::Number(to_number(&l)? + to_number(&r)?)
                }
                _ => FieldValue::Text(format!("{l}{r}")),
            },
            BinaryOp::Sub => FieldValue::Number(to_number(&l)? - to_number(&r)?),
            BinaryOp::Mul => FieldValue::Number(to_number(&l)? * to_number(&r)?),
            BinaryOp::Div | BinaryOp::Mod => {
                let divisor = to_number(&r)?;
                if divisor == 0.0 {
                    return Err(FormulaError::DivisionByZero);
                }
                let dividend = to_number(&l)?;
                FieldValue::Number(if op == BinaryOp::Div {
                    dividend / divisor
                } else {
                    dividend % divisor
                })
            }
            BinaryOp::Eq => FieldValue::Bool(compare(&l, &r)? == Ordering::Equal),
            BinaryOp::Ne => FieldValue::Bool(compare(&l, &r)? != Ordering::Equal),
            BinaryOp::Lt => FieldValue::Bool(compare(&l, &r)? == Ordering::Less),
            BinaryOp::Le => FieldValue::Bool(compare(&l, &r)? != Ordering::Greater),
            BinaryOp::Gt => FieldValue::Bool(compare(&l, &r)? == Ordering::Greater),
            BinaryOp::Ge => FieldValue::Bool(compare(&l, &r)? != Ordering::Less),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(value)
    }

    fn call(&self, function: &str, args: &[Expr]) -> Result<FieldValue, FormulaError> {
        // `if` must not evaluate the branch it does not take.
        if function == "if" {
            arity(function, args, 3, Some(3), "3")?;
            return if truthy(&self.eval(&args[0])?) {
                self.eval(&args[1])
            } else {
                self.eval(&args[2])
            };
        }

        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match function {
            "today" => {
                arity(function, args, 0, Some(0), "0")?;
                Ok(FieldValue::Text(self.clock.today().format("%Y-%m-%d").to_string()))
            }
            "current_year" => {
                arity(function, args, 0, Some(0), "0")?;
                Ok(FieldValue::Number(self.clock.today().year() as f64))
            }
            "year" | "month" | "day" => {
                arity(function, args, 1, Some(1), "1")?;
                let date = to_date(&values[0])?;
                let part = match function {
                    "year" => date.year() as f64,
                    "month" => date.month() as f64,
                    _ => date.day() as f64,
                };
                Ok(FieldValue::Number(part))
            }
            "age" => {
                arity(function, args, 1, Some(1), "1")?;
                let born = to_date(&values[0])?;
                let today = self.clock.today();
                let mut years = today.year() - born.year();
                if (today.month(), today.day()) < (born.month(), born.day()) {
                    years -= 1;
                }
                Ok(FieldValue::Number(years as f64))
            }
            "len" => {
                arity(function, args, 1, Some(1), "1")?;
                let len = values[0]
                    .length()
                    .unwrap_or_else(|| values[0].to_string().chars().count());
                Ok(FieldValue::Number(len as f64))
            }
            "upper" | "lower" | "trim" | "text" => {
                arity(function, args, 1, Some(1), "1")?;
                let text = values[0].to_string();
                Ok(FieldValue::Text(match function {
                    "upper" => text.to_uppercase(),
                    "lower" => text.to_lowercase(),
                    "trim" => text.trim().to_string(),
                    _ => text,
                }))
            }
            "concat" => Ok(FieldValue::Text(
                values.iter().map(|v| v.to_string()).collect(),
            )),
            "number" | "abs" | "floor" | "ceil" => {
                arity(function, args, 1, Some(1), "1")?;
                let n = to_number(&values[0])?;
                Ok(FieldValue::Number(match function {
                    "abs" => n.abs(),
                    "floor" => n.floor(),
                    "ceil" => n.ceil(),
                    _ => n,
                }))
            }
            "round" => {
                arity(function, args, 1, Some(2), "1 or 2")?;
                let n = to_number(&values[0])?;
                let digits = match values.get(1) {
                    Some(d) => to_index(d)?,
                    None => 0,
                };
                let factor = 10f64.powi(digits.clamp(-15, 15) as i32);
                Ok(FieldValue::Number((n * factor).round() / factor))
            }
            "min" | "max" => {
                arity(function, args, 1, None, "at least 1")?;
                let mut best = to_number(&values[0])?;
                for value in &values[1..] {
                    let n = to_number(value)?;
                    best = if function == "min" { best.min(n) } else { best.max(n) };
                }
                Ok(FieldValue::Number(best))
            }
            _ => Err(FormulaError::UnknownFunction(function.to_string())),
        }
    }
}

fn arity(
    name: &str,
    args: &[Expr],
    min: usize,
    max: Option<usize>,
    expected: &'static str,
) -> Result<(), FormulaError> {
    let got = args.len();
    if got < min || max.is_some_and(|m| got > m) {
        return Err(FormulaError::Arity {
            name: name.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Numeric reading of a value, if it has one.
fn numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_number(value: &FieldValue) -> Result<f64, FormulaError> {
    match value {
        FieldValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => numeric(other)
            .ok_or_else(|| FormulaError::Type(format!("`{other}` is not a number"))),
    }
}

fn to_index(value: &FieldValue) -> Result<i64, FormulaError> {
    let n = to_number(value)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(FormulaError::Type(format!(
            "`{}` is not a whole number",
            format_number(n)
        )));
    }
    Ok(n as i64)
}

fn to_date(value: &FieldValue) -> Result<NaiveDate, FormulaError> {
    let text = value.to_string();
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()))
        .ok_or_else(|| FormulaError::InvalidDate(text.to_string()))
}

fn truthy(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Number(n) => *n != 0.0 && !n.is_nan(),
        FieldValue::Text(s) => !s.is_empty(),
        FieldValue::List(items) => !items.is_empty(),
    }
}

fn compare(l: &FieldValue, r: &FieldValue) -> Result<Ordering, FormulaError> {
    match (numeric(l), numeric(r)) {
        (Some(a), Some(b)) => a
            .partial_cmp(&b)
            .ok_or_else(|| FormulaError::Type("cannot compare NaN".to_string())),
        _ => Ok(l.to_string().cmp(&r.to_string())),
    }
}
