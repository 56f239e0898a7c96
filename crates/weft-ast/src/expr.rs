//! Expression trees for the restricted subset.
//!
//! Hosts build these trees programmatically (there is no text parser;
//! the authoring surface is the host language itself), so every variant
//! has a builder-style constructor. Identifiers are resolved against a
//! lexical scope during transpilation, not here; this crate is shape only.
//!
//! # Design
//!
//! - **No silent coercion** — promotion happens in the typed combinators
//!   during transpilation, never in the tree.
//! - **Calls are name-based** — a call's callee is an identifier resolved
//!   through the scope to a builtin, a user function, or a struct
//!   constructor.
//! - **References are explicit** — [`Expr::Ref`] and [`Expr::Deref`]
//!   are the only way pointers enter or leave an expression.

use serde::{Deserialize, Serialize};
use weft_types::{BinaryOp, UnaryOp};

/// An expression in the restricted subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Boolean literal.
    LitBool(bool),
    /// Untyped integer literal (abstract-int).
    LitInt(i64),
    /// Untyped floating literal (abstract-float).
    LitFloat(f64),
    /// Identifier, resolved against the lexical scope.
    Ident(String),
    /// Unary operation.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Conditional expression; the condition must be comptime-known.
    Ternary {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// Member or swizzle access.
    Member { object: Box<Expr>, member: String },
    /// Array/vector/matrix indexing.
    Index { object: Box<Expr>, index: Box<Expr> },
    /// Call of a builtin, user function, or struct constructor.
    Call { callee: String, args: Vec<Expr> },
    /// Array literal; element type is inferred from the elements.
    ArrayLit(Vec<Expr>),
    /// Take a reference to a named mutable location.
    Ref { target: String },
    /// Dereference a pointer expression.
    Deref(Box<Expr>),
}

impl Expr {
    /// Identifier.
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(name.into())
    }

    /// Integer literal.
    pub fn int(v: i64) -> Expr {
        Expr::LitInt(v)
    }

    /// Floating literal.
    pub fn float(v: f64) -> Expr {
        Expr::LitFloat(v)
    }

    /// Boolean literal.
    pub fn bool_lit(v: bool) -> Expr {
        Expr::LitBool(v)
    }

    /// Binary operation.
    pub fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// `lhs + rhs`
    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinaryOp::Mul, lhs, rhs)
    }

    /// `lhs / rhs`
    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinaryOp::Div, lhs, rhs)
    }

    /// `lhs < rhs`
    pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinaryOp::Lt, lhs, rhs)
    }

    /// Unary operation.
    pub fn un(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Member or swizzle access.
    pub fn member(object: Expr, member: impl Into<String>) -> Expr {
        Expr::Member {
            object: Box::new(object),
            member: member.into(),
        }
    }

    /// Indexing.
    pub fn index(object: Expr, index: Expr) -> Expr {
        Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    /// Call by callee name.
    pub fn call(callee: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Call {
            callee: callee.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Conditional expression.
    pub fn ternary(cond: Expr, then_value: Expr, else_value: Expr) -> Expr {
        Expr::Ternary {
            cond: Box::new(cond),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        }
    }

    /// Reference to a named location.
    pub fn ref_to(target: impl Into<String>) -> Expr {
        Expr::Ref {
            target: target.into(),
        }
    }

    /// Dereference.
    pub fn deref(ptr: Expr) -> Expr {
        Expr::Deref(Box::new(ptr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_compose() {
        // (a + 1.0) * b.x
        let e = Expr::mul(
            Expr::add(Expr::ident("a"), Expr::float(1.0)),
            Expr::member(Expr::ident("b"), "x"),
        );
        match e {
            Expr::Binary {
                op: BinaryOp::Mul, ..
            } => {}
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
