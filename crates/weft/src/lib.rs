// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Typed WGSL cross-compiler.
//!
//! `weft` turns shader logic authored as host-side expression trees into
//! one deduplicated, dependency-ordered WGSL program. The pipeline:
//!
//! 1. **Transpile** — walk a function body against a lexical scope of
//!    typed snippets, dispatching operators through a promotion-aware
//!    combinator table.
//! 2. **Specialize** — monomorphize type-agnostic functions per distinct
//!    (function, argument types, active bindings) key.
//! 3. **Resolve** — walk the dependency closure of the entry points,
//!    naming every declaration through a collision-free [`Namespace`] and
//!    emitting structs, globals, functions, and entry bodies in order.
//!
//! # Example
//!
//! ```
//! use weft::{resolve, EntryPoint, ShaderFn};
//! use weft_ast::{Block, Expr, FnDef, Param, Stmt};
//!
//! let main = ShaderFn::new(FnDef::new(
//!     "main",
//!     vec![Param::auto("gid")],
//!     Block::new([Stmt::let_(
//!         "idx",
//!         Expr::member(Expr::ident("gid"), "x"),
//!     )]),
//! ))
//! .build();
//!
//! let entry = EntryPoint::compute(main, [64, 1, 1]).input(weft::IoField::builtin(
//!     "gid",
//!     weft::BuiltinValue::GlobalInvocationId,
//!     weft::types::DataType::vec3u(),
//! ));
//!
//! let resolved = resolve(&[entry]).unwrap();
//! assert!(resolved.wgsl.contains("@compute @workgroup_size(64, 1, 1)"));
//! ```
//!
//! Resolution is a pure function of its inputs: identical entry points
//! against a fresh namespace produce byte-identical text, and failures
//! are structured [`ResolveError`]s with a breadcrumb trail; output is
//! never partial.

mod builtins;
pub mod error;
pub mod log;
pub mod program;
pub mod resolve;
pub(crate) mod transpile;

pub use error::{ErrorKind, ResolveError, ResolveResult};
pub use log::{LogCallSite, LogConfig};
pub use program::{
    BuiltinValue, EntryPoint, External, FnHandle, GlobalHandle, GlobalSpace, GlobalVar, IoField,
    ShaderFn, Slot, SlotHandle, Stage,
};
pub use resolve::namespace::Namespace;
pub use resolve::{Resolved, ResolutionContext, ResolveOptions};

pub use weft_ast as ast;
pub use weft_types as types;

/// Resolve entry points with default options and a fresh namespace.
pub fn resolve(entries: &[EntryPoint]) -> ResolveResult<Resolved> {
    let mut ns = Namespace::new();
    ResolutionContext::new(ResolveOptions::default()).resolve(&mut ns, entries)
}
