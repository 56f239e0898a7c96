// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the restricted shader subset.
//!
//! This crate defines the expression/statement trees and function
//! definitions the weft cross-compiler consumes. Hosts construct trees
//! directly through the builder constructors; there is no source-text
//! parser in the pipeline.

pub mod expr;
pub mod func;
pub mod stmt;
pub mod visit;

pub use expr::Expr;
pub use func::{FnDef, Param, ParamType};
pub use stmt::{Block, Stmt};
pub use visit::referenced_idents;
