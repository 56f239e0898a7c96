//! Seam to the external memory-layout engine.
//!
//! Byte size, alignment, and per-field offsets for schema trees are
//! computed by an external collaborator; the cross-compiler only defines
//! the interface and guarantees that emitted struct text and host-side
//! binary layouts consume the *same* schema (including explicit
//! `@align`/`@size` overrides), so the two descriptions are byte-identical
//! by construction.
//!
//! Override reproduction order is part of the contract: for each field,
//! explicit alignment first, then explicit size, then the field itself.

use crate::types::{DataType, StructType};

/// Memory-layout queries the resolver and the binary I/O layer share.
///
/// Implementations must honor explicit overrides carried on
/// [`crate::StructField`]: an explicit `align` replaces the computed
/// alignment, an explicit `size` replaces the computed span, and offsets
/// follow from both.
pub trait LayoutEngine {
    /// Byte size of a type; `None` for runtime-sized or opaque types.
    fn size_of(&self, ty: &DataType) -> Option<u64>;

    /// Byte alignment of a type; `None` for opaque types.
    fn align_of(&self, ty: &DataType) -> Option<u64>;

    /// Byte offset of every field of `schema`, in field order.
    fn field_offsets(&self, schema: &StructType) -> Option<Vec<u64>>;
}
