//! Identifier collection over expression trees.
//!
//! Used for dead-argument elision: a parameter never referenced by the
//! body drops out of the emitted signature and every call site.

use std::collections::HashSet;

use crate::expr::Expr;
use crate::stmt::{Block, Stmt};

/// Collect every identifier referenced anywhere in a block.
///
/// The scan is purely syntactic: shadowing locals count as uses of the
/// name, which keeps elision conservative.
pub fn referenced_idents(block: &Block) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_block(block, &mut out);
    out
}

fn collect_block(block: &Block, out: &mut HashSet<String>) {
    for stmt in block.stmts() {
        collect_stmt(stmt, out);
    }
}

fn collect_stmt(stmt: &Stmt, out: &mut HashSet<String>) {
    match stmt {
        Stmt::Let { init, .. } | Stmt::Var { init, .. } => collect_expr(init, out),
        Stmt::Assign { target, value, .. } => {
            collect_expr(target, out);
            collect_expr(value, out);
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            collect_expr(cond, out);
            collect_block(then_block, out);
            if let Some(else_block) = else_block {
                collect_block(else_block, out);
            }
        }
        Stmt::While { cond, body } => {
            collect_expr(cond, out);
            collect_block(body, out);
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                collect_stmt(init, out);
            }
            if let Some(cond) = cond {
                collect_expr(cond, out);
            }
            if let Some(step) = step {
                collect_stmt(step, out);
            }
            collect_block(body, out);
        }
        Stmt::Return(Some(expr)) => collect_expr(expr, out),
        Stmt::Return(None) => {}
        Stmt::Expr(expr) => collect_expr(expr, out),
    }
}

fn collect_expr(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Ident(name) | Expr::Ref { target: name } => {
            out.insert(name.clone());
        }
        Expr::Unary { operand, .. } => collect_expr(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr(lhs, out);
            collect_expr(rhs, out);
        }
        Expr::Ternary {
            cond,
            then_value,
            else_value,
        } => {
            collect_expr(cond, out);
            collect_expr(then_value, out);
            collect_expr(else_value, out);
        }
        Expr::Member { object, .. } => collect_expr(object, out),
        Expr::Index { object, index } => {
            collect_expr(object, out);
            collect_expr(index, out);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_expr(arg, out);
            }
        }
        Expr::ArrayLit(elems) => {
            for elem in elems {
                collect_expr(elem, out);
            }
        }
        Expr::Deref(inner) => collect_expr(inner, out),
        Expr::LitBool(_) | Expr::LitInt(_) | Expr::LitFloat(_) => {}
    }
}
