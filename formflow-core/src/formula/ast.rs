//! Formula Syntax Tree
//!
//! The parsed form of a formula. Names are resolved only at evaluation
//! time, against the bindings the caller supplies.

use crate::schema::FieldValue;

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Logic
    Or,
    And,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne => 3,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Const(FieldValue),

    /// Read a bound name.
    Load(String),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// `condition ? then : otherwise`
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Builtin function call.
    Call { function: String, args: Vec<Expr> },

    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    /// Every name the expression loads, in first-use order, without repeats.
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    /// Height of the tree, counting a leaf as one. Walks with an explicit
    /// stack so arbitrarily deep trees can be measured.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            match node {
                Expr::Const(_) | Expr::Load(_) => {}
                Expr::Unary { operand, .. } => stack.push((operand, depth + 1)),
                Expr::Binary { lhs, rhs, .. } => {
                    stack.push((lhs, depth + 1));
                    stack.push((rhs, depth + 1));
                }
                Expr::Conditional {
                    condition,
                    then,
                    otherwise,
                } => {
                    stack.push((condition, depth + 1));
                    stack.push((then, depth + 1));
                    stack.push((otherwise, depth + 1));
                }
                Expr::Call { args, .. } => stack.extend(args.iter().map(|arg| (arg, depth + 1))),
                Expr::Index { target, index } => {
                    stack.push((target, depth + 1));
                    stack.push((index, depth + 1));
                }
            }
        }
        deepest
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Const(_) => {}
            Expr::Load(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_references(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(names);
                rhs.collect_references(names);
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_references(names);
                then.collect_references(names);
                otherwise.collect_references(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(names);
                }
            }
            Expr::Index { target, index } => {
                target.collect_references(names);
                index.collect_references(names);
            }
        }
    }
}
