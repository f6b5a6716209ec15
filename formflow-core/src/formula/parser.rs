//! Formula Parser
//!
//! A chumsky grammar over the formula text, with a pratt table for operator
//! precedence. Source length, bracket nesting and tree depth are capped by
//! [`FormulaLimits`] so a hostile formula cannot exhaust the stack either
//! here or in the evaluator.

use chumsky::{pratt::*, prelude::*};

use super::ast::{BinaryOp, Expr, UnaryOp};
use crate::config::FormulaLimits;
use crate::error::FormulaError;
use crate::schema::FieldValue;

pub type ParseError<'src> = Rich<'src, char>;

fn syntax(offset: usize, message: impl Into<String>) -> FormulaError {
    FormulaError::Syntax {
        offset,
        message: message.into(),
    }
}

fn too_deep(max_depth: usize) -> FormulaError {
    FormulaError::Limit(format!("nesting deeper than {max_depth}"))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

/// Grammar for a whole formula, trailing input included.
pub fn formula<'src>() -> impl Parser<'src, &'src str, Expr, extra::Err<ParseError<'src>>> {
    let expression = recursive(|expression| {
        let digits = text::digits(10);
        let number = digits
            .clone()
            .then(just('.').then(digits.clone()).or_not())
            .ignored()
            .or(just('.').then(digits).ignored())
            .to_slice()
            .try_map(|text: &str, span| {
                text.parse::<f64>()
                    .map(|n| Expr::Const(FieldValue::Number(n)))
                    .map_err(|_| Rich::custom(span, format!("malformed number `{text}`")))
            });

        let escape = just('\\').ignore_then(choice((
            just('n').to('\n'),
            just('t').to('\t'),
            any(),
        )));
        let string = |quote: char| {
            just(quote)
                .ignore_then(
                    none_of([quote, '\\'])
                        .or(escape.clone())
                        .repeated()
                        .collect::<String>(),
                )
                .then_ignore(just(quote))
                .map(|text| Expr::Const(FieldValue::Text(text)))
        };

        // Backticks admit ids that are not plain identifiers.
        let quoted = just('`')
            .ignore_then(none_of('`').repeated().at_least(1).to_slice())
            .then_ignore(just('`'))
            .map(|name: &str| Expr::Load(name.to_string()));

        let identifier = any()
            .filter(|c: &char| c.is_alphabetic() || *c == '_')
            .then(
                any()
                    .filter(|c: &char| c.is_alphanumeric() || *c == '_')
                    .repeated(),
            )
            .to_slice();

        let arguments = expression
            .clone()
            .separated_by(just(',').padded())
            .collect::<Vec<_>>()
            .delimited_by(just('(').padded(), just(')'));

        let name_or_call = identifier.then(arguments.or_not()).map(
            |(name, args): (&str, Option<Vec<Expr>>)| match (name, args) {
                (function, Some(args)) => Expr::Call {
                    function: function.to_string(),
                    args,
                },
                ("true", None) => Expr::Const(FieldValue::Bool(true)),
                ("false", None) => Expr::Const(FieldValue::Bool(false)),
                (name, None) => Expr::Load(name.to_string()),
            },
        );

        let nested = expression
            .clone()
            .delimited_by(just('(').padded(), just(')'));

        let atom = choice((
            number,
            string('"'),
            string('\''),
            quoted,
            name_or_call,
            nested,
        ))
        .padded();

        let subscript = expression
            .clone()
            .delimited_by(just('[').padded(), just(']').padded());

        let operators = atom.pratt((
            infix(left(1), just("||").padded(), |l, _, r, _| {
                binary(BinaryOp::Or, l, r)
            }),
            infix(left(2), just("&&").padded(), |l, _, r, _| {
                binary(BinaryOp::And, l, r)
            }),
            infix(
                left(3),
                choice((just("==").to(BinaryOp::Eq), just("!=").to(BinaryOp::Ne))).padded(),
                |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(4),
                choice((
                    just("<=").to(BinaryOp::Le),
                    just(">=").to(BinaryOp::Ge),
                    just('<').to(BinaryOp::Lt),
                    just('>').to(BinaryOp::Gt),
                ))
                .padded(),
                |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(5),
                choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub))).padded(),
                |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(6),
                choice((
                    just('*').to(BinaryOp::Mul),
                    just('/').to(BinaryOp::Div),
                    just('%').to(BinaryOp::Mod),
                ))
                .padded(),
                |l, op, r, _| binary(op, l, r),
            ),
            prefix(
                7,
                choice((just('-').to(UnaryOp::Neg), just('!').to(UnaryOp::Not))).padded(),
                |op, operand, _| unary(op, operand),
            ),
            postfix(8, subscript, |target, index, _| Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            }),
        ));

        // `condition ? then : otherwise`, right-associative through `otherwise`.
        operators
            .then(
                just('?')
                    .padded()
                    .ignore_then(expression.clone())
                    .then_ignore(just(':').padded())
                    .then(expression)
                    .or_not(),
            )
            .map(|(condition, branches)| match branches {
                Some((then, otherwise)) => Expr::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                None => condition,
            })
    });

    expression.then_ignore(end())
}

/// Bound the recursion the grammar will need before running it, and point at
/// a bare `=` with a better message than the grammar would give.
///
/// Open brackets, conditionals and runs of prefix operators each cost one
/// level of recursion; their sum may not exceed `max_depth`.
fn scan(source: &str, max_depth: usize) -> Result<(), FormulaError> {
    let mut chars = source.char_indices().peekable();
    let mut quote = None;
    let mut brackets = 0usize;
    let mut conditionals = 0usize;
    let mut prefix_run = 0usize;

    while let Some((offset, c)) = chars.next() {
        if let Some(open) = quote {
            match c {
                '\\' if open != '`' => {
                    chars.next();
                }
                c if c == open => quote = None,
                _ => {}
            }
            continue;
        }

        match c {
            '=' | '!' | '<' | '>' if chars.next_if(|&(_, n)| n == '=').is_some() => {
                prefix_run = 0;
            }
            '=' => return Err(syntax(offset, "assignment is not allowed, use `==`")),
            '-' | '!' => prefix_run += 1,
            c if c.is_whitespace() => {}
            other => {
                prefix_run = 0;
                match other {
                    '"' | '\'' | '`' => quote = Some(other),
                    '(' | '[' => brackets += 1,
                    ')' | ']' => brackets = brackets.saturating_sub(1),
                    '?' => conditionals += 1,
                    _ => {}
                }
            }
        }

        if brackets + conditionals + prefix_run > max_depth {
            return Err(too_deep(max_depth));
        }
    }
    Ok(())
}

/// Parse a formula into an expression tree.
pub fn parse(source: &str, limits: &FormulaLimits) -> Result<Expr, FormulaError> {
    if source.len() > limits.max_source_len {
        return Err(FormulaError::Limit(format!(
            "formula longer than {} bytes",
            limits.max_source_len
        )));
    }
    scan(source, limits.max_depth)?;

    let expr = formula().parse(source).into_result().map_err(|errors| {
        match errors.into_iter().next() {
            Some(error) => syntax(error.span().start, error.to_string()),
            None => syntax(0, "malformed formula"),
        }
    })?;

    // Operator and subscript chains build depth without nesting in the text.
    if expr.depth() > limits.max_depth {
        return Err(too_deep(limits.max_depth));
    }
    Ok(expr)
}
