// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Shared type and snippet model for the weft cross-compiler.
//!
//! This crate contains the pure data vocabulary the other weft crates
//! exchange:
//!
//! - [`DataType`] — WGSL-level type descriptors
//! - [`Snippet`] — value + type + origin, the transpilation currency
//! - [`ConstValue`] / promotion table — in-process constants and the
//!   implicit-conversion rules
//! - [`StructType`] / [`StructHandle`] — struct schemas with explicit
//!   layout overrides, shared by identity
//! - [`LayoutEngine`] — the interface to the external memory-layout
//!   collaborator
//!
//! No resolution logic lives here; this crate is pure data plus the typed
//! combinators over it.

pub mod layout;
pub mod op;
pub mod scalar;
pub mod snippet;
pub mod types;

pub use layout::LayoutEngine;
pub use op::{BinaryOp, UnaryOp};
pub use scalar::{fold_binary, unify, ConstValue, ScalarKind, Unified};
pub use snippet::{access_member, binary, unary, Combined, Origin, Snippet, SnippetValue, TypeError};
pub use types::{AccessMode, AddressSpace, DataType, StructField, StructHandle, StructType};
