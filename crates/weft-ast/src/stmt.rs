//! Statements and blocks of the restricted subset.

use serde::{Deserialize, Serialize};
use weft_types::BinaryOp;

use crate::expr::Expr;

/// A statement in the restricted subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Immutable local binding.
    Let { name: String, init: Expr },
    /// Mutable local binding (a fresh copy; the only place a reference
    /// may be taken from).
    Var { name: String, init: Expr },
    /// Assignment, plain (`op: None`) or compound (`op: Some(Add)` for `+=`).
    Assign {
        target: Expr,
        op: Option<BinaryOp>,
        value: Expr,
    },
    /// Conditional statement.
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// Bounded loop with explicit condition.
    While { cond: Expr, body: Block },
    /// C-style bounded loop.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Block,
    },
    /// Return from the enclosing function.
    Return(Option<Expr>),
    /// Expression in statement position (calls with side effects).
    Expr(Expr),
}

impl Stmt {
    /// `let name = init;`
    pub fn let_(name: impl Into<String>, init: Expr) -> Stmt {
        Stmt::Let {
            name: name.into(),
            init,
        }
    }

    /// `var name = init;`
    pub fn var(name: impl Into<String>, init: Expr) -> Stmt {
        Stmt::Var {
            name: name.into(),
            init,
        }
    }

    /// `target = value;`
    pub fn assign(target: Expr, value: Expr) -> Stmt {
        Stmt::Assign {
            target,
            op: None,
            value,
        }
    }

    /// `target op= value;`
    pub fn assign_op(target: Expr, op: BinaryOp, value: Expr) -> Stmt {
        Stmt::Assign {
            target,
            op: Some(op),
            value,
        }
    }

    /// `return expr;`
    pub fn ret(expr: Expr) -> Stmt {
        Stmt::Return(Some(expr))
    }

    /// `if cond { ... }`
    pub fn if_(cond: Expr, then_block: Block) -> Stmt {
        Stmt::If {
            cond,
            then_block,
            else_block: None,
        }
    }

    /// `if cond { ... } else { ... }`
    pub fn if_else(cond: Expr, then_block: Block, else_block: Block) -> Stmt {
        Stmt::If {
            cond,
            then_block,
            else_block: Some(else_block),
        }
    }
}

/// An ordered statement list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block(pub Vec<Stmt>);

impl Block {
    /// Block from statements.
    pub fn new(stmts: impl IntoIterator<Item = Stmt>) -> Self {
        Block(stmts.into_iter().collect())
    }

    /// The statements.
    pub fn stmts(&self) -> &[Stmt] {
        &self.0
    }
}

impl From<Vec<Stmt>> for Block {
    fn from(stmts: Vec<Stmt>) -> Self {
        Block(stmts)
    }
}
