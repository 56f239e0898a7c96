//! The snippet model: value + type + origin.
//!
//! A [`Snippet`] is the unit of data flow through the cross-compiler.
//! Its value is either rendered WGSL expression text or an in-process
//! [`ConstValue`] when fully known ahead of time. Its [`Origin`] tracks
//! where the value lives, ordered from most available (a literal constant)
//! to least available (read-write storage); combining snippets always
//! takes the least-available origin, so:
//!
//! - constant ∘ constant → constant (folded in-process)
//! - anything ∘ storage → runtime
//!
//! The binary/unary combinators here are the typed dispatch table for
//! operators: they unify operand kinds through the promotion table, check
//! shapes, fold constants, and render text for everything else.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::scalar::{self, ConstValue, ScalarKind};
use crate::types::{AccessMode, AddressSpace, DataType};
use crate::{BinaryOp, UnaryOp};

/// Where a snippet's value is stored, ordered by decreasing availability.
///
/// The variant order is load-bearing: [`Origin::join`] takes the maximum,
/// which is the least-available operand origin.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Origin {
    /// A literal constant, fully known ahead of time.
    Constant,
    /// Computed ahead of time from constants.
    Comptime,
    /// A function-local value.
    Local,
    /// Reached through a pointer parameter of the current function.
    SelfDeref,
    /// Module-scope private variable.
    Private,
    /// Workgroup-shared variable.
    Workgroup,
    /// Uniform binding.
    Uniform,
    /// Read-only storage binding.
    StorageRead,
    /// Read-write storage binding.
    StorageReadWrite,
}

impl Origin {
    /// Combine two origins: the least available wins.
    pub fn join(self, other: Origin) -> Origin {
        self.max(other)
    }

    /// Check if a value with this origin is known at resolution time.
    pub fn is_comptime(self) -> bool {
        self <= Origin::Comptime
    }

    /// Check if this origin names a storage-space location.
    pub fn is_storage(self) -> bool {
        matches!(self, Origin::StorageRead | Origin::StorageReadWrite)
    }

    /// The address space a reference taken from this origin lives in.
    ///
    /// `None` for origins that do not denote a referenceable location.
    pub fn address_space(self) -> Option<(AddressSpace, AccessMode)> {
        match self {
            Origin::Local => Some((AddressSpace::Function, AccessMode::ReadWrite)),
            Origin::Private => Some((AddressSpace::Private, AccessMode::ReadWrite)),
            Origin::Workgroup => Some((AddressSpace::Workgroup, AccessMode::ReadWrite)),
            Origin::StorageRead => Some((AddressSpace::Storage, AccessMode::Read)),
            Origin::StorageReadWrite => Some((AddressSpace::Storage, AccessMode::ReadWrite)),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Constant => "constant",
            Origin::Comptime => "comptime",
            Origin::Local => "function-local",
            Origin::SelfDeref => "this-function dereference",
            Origin::Private => "private",
            Origin::Workgroup => "workgroup",
            Origin::Uniform => "uniform",
            Origin::StorageRead => "read-only storage",
            Origin::StorageReadWrite => "read-write storage",
        };
        write!(f, "{name}")
    }
}

/// A snippet's value: rendered text, or an in-process constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SnippetValue {
    /// WGSL expression text.
    Text(String),
    /// Fully known scalar constant.
    Const(ConstValue),
}

/// Value + type + origin: the currency passed between transpiler,
/// specializer, and resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub value: SnippetValue,
    pub ty: DataType,
    pub origin: Origin,
}

impl Snippet {
    /// A runtime snippet from rendered text.
    pub fn new(text: impl Into<String>, ty: DataType, origin: Origin) -> Self {
        Self {
            value: SnippetValue::Text(text.into()),
            ty,
            origin,
        }
    }

    /// A constant snippet; type and origin follow from the value.
    pub fn constant(value: ConstValue) -> Self {
        Self {
            value: SnippetValue::Const(value),
            ty: DataType::Scalar(value.kind()),
            origin: Origin::Constant,
        }
    }

    /// The constant payload, when this snippet is comptime-known.
    pub fn comptime_const(&self) -> Option<&ConstValue> {
        match &self.value {
            SnippetValue::Const(v) if self.origin.is_comptime() => Some(v),
            _ => None,
        }
    }

    /// Render this snippet as a WGSL expression.
    pub fn render(&self) -> String {
        match &self.value {
            SnippetValue::Text(t) => t.clone(),
            SnippetValue::Const(v) => v.wgsl_literal(),
        }
    }

    /// Short textual form for diagnostics: the rendered expression.
    pub fn describe(&self) -> String {
        self.render()
    }
}

/// Failures of the snippet combinators.
///
/// These are context-free; the resolver wraps them with a breadcrumb
/// trail before surfacing them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    #[error("property '{member}' not found on '{value}' of type {ty}")]
    PropertyNotFound {
        member: String,
        value: String,
        ty: String,
    },

    #[error("operator '{op}' cannot combine {lhs} and {rhs}")]
    Mismatch {
        op: &'static str,
        lhs: String,
        rhs: String,
    },

    #[error("operator '{op}' is not defined for {operand}")]
    InvalidOperand { op: &'static str, operand: String },
}

/// Result of a binary combinator.
#[derive(Debug, Clone)]
pub struct Combined {
    pub snippet: Snippet,
    /// A concrete operand changed kind through implicit promotion.
    pub promoted: bool,
}

/// Apply a binary operator to two snippets.
///
/// Unifies the operand kinds through the promotion table, checks shapes,
/// folds when both operands are comptime constants, and renders
/// parenthesized text otherwise.
pub fn binary(op: BinaryOp, lhs: &Snippet, rhs: &Snippet) -> Result<Combined, TypeError> {
    let mismatch = || TypeError::Mismatch {
        op: op.token(),
        lhs: lhs.ty.to_string(),
        rhs: rhs.ty.to_string(),
    };

    // Logical operators: scalar booleans only.
    if op.is_logical() {
        if !(lhs.ty.is_bool() && rhs.ty.is_bool()) {
            return Err(mismatch());
        }
        return Ok(combine(op, lhs, rhs, DataType::bool(), ScalarKind::Bool, false));
    }

    // Equality on booleans.
    if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && lhs.ty.is_bool() && rhs.ty.is_bool() {
        return Ok(combine(op, lhs, rhs, DataType::bool(), ScalarKind::Bool, false));
    }

    // Matrix algebra: only `*`, only matching float kinds.
    if matches!(lhs.ty, DataType::Matrix { .. }) || matches!(rhs.ty, DataType::Matrix { .. }) {
        if op != BinaryOp::Mul {
            return Err(mismatch());
        }
        let ty = matrix_mul_type(&lhs.ty, &rhs.ty).ok_or_else(mismatch)?;
        let kind = ty.scalar_kind().unwrap_or(ScalarKind::F32);
        return Ok(combine(op, lhs, rhs, ty, kind, false));
    }

    // Everything else is scalar/vector numeric territory.
    let lk = lhs.ty.scalar_kind().ok_or_else(mismatch)?;
    let rk = rhs.ty.scalar_kind().ok_or_else(mismatch)?;
    let unified = scalar::unify(lk, rk).ok_or_else(mismatch)?;

    if op.is_bitwise() && !unified.kind.is_integer() {
        return Err(mismatch());
    }
    if !op.is_comparison() && !unified.kind.is_numeric() {
        return Err(mismatch());
    }

    let shape = broadcast_shape(&lhs.ty, &rhs.ty).ok_or_else(mismatch)?;
    let result_ty = if op.is_comparison() {
        shape_with_kind(&shape, ScalarKind::Bool)
    } else {
        shape_with_kind(&shape, unified.kind)
    };

    Ok(combine(op, lhs, rhs, result_ty, unified.kind, unified.promoted))
}

/// Apply a unary operator to a snippet.
pub fn unary(op: UnaryOp, operand: &Snippet) -> Result<Snippet, TypeError> {
    let invalid = || TypeError::InvalidOperand {
        op: op.token(),
        operand: operand.ty.to_string(),
    };

    let kind = operand.ty.scalar_kind().ok_or_else(invalid)?;
    match op {
        UnaryOp::Neg => {
            if !kind.is_numeric() || kind == ScalarKind::U32 {
                return Err(invalid());
            }
        }
        UnaryOp::Not => {
            if kind != ScalarKind::Bool {
                return Err(invalid());
            }
        }
        UnaryOp::BitNot => {
            if !kind.is_integer() {
                return Err(invalid());
            }
        }
    }

    // Fold scalar constants.
    if let Some(v) = operand.comptime_const() {
        let folded = match (op, v) {
            (UnaryOp::Neg, ConstValue::AbstractInt(i)) => i.checked_neg().map(ConstValue::AbstractInt),
            (UnaryOp::Neg, ConstValue::I32(i)) => i.checked_neg().map(ConstValue::I32),
            (UnaryOp::Neg, ConstValue::AbstractFloat(x)) => Some(ConstValue::AbstractFloat(-x)),
            (UnaryOp::Neg, ConstValue::F32(x)) => Some(ConstValue::F32(-x)),
            (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
            (UnaryOp::BitNot, ConstValue::AbstractInt(i)) => Some(ConstValue::AbstractInt(!i)),
            (UnaryOp::BitNot, ConstValue::I32(i)) => Some(ConstValue::I32(!i)),
            (UnaryOp::BitNot, ConstValue::U32(i)) => Some(ConstValue::U32(!i)),
            _ => None,
        };
        if let Some(folded) = folded {
            return Ok(Snippet {
                value: SnippetValue::Const(folded),
                ty: operand.ty.clone(),
                origin: operand.origin,
            });
        }
    }

    Ok(Snippet::new(
        format!("({}{})", op.token(), operand.render()),
        operand.ty.clone(),
        operand.origin,
    ))
}

/// Member or swizzle access on a struct/vector snippet.
pub fn access_member(value: &Snippet, member: &str) -> Result<Snippet, TypeError> {
    let not_found = || TypeError::PropertyNotFound {
        member: member.to_string(),
        value: value.describe(),
        ty: value.ty.to_string(),
    };

    match &value.ty {
        DataType::Struct(handle) => {
            let field = handle.field_named(member).ok_or_else(not_found)?;
            Ok(Snippet::new(
                format!("{}.{member}", value.render()),
                field.ty.clone(),
                value.origin,
            ))
        }
        DataType::Vector { size, scalar } => {
            let ty = swizzle_type(member, *size, *scalar).ok_or_else(not_found)?;
            Ok(Snippet::new(
                format!("{}.{member}", value.render()),
                ty,
                value.origin,
            ))
        }
        _ => Err(not_found()),
    }
}

/// Validate a swizzle pattern against a vector size; returns the result type.
fn swizzle_type(pattern: &str, size: u8, scalar: ScalarKind) -> Option<DataType> {
    if pattern.is_empty() || pattern.len() > 4 {
        return None;
    }
    let sets: [&str; 2] = ["xyzw", "rgba"];
    let valid = sets.iter().any(|set| {
        pattern
            .chars()
            .all(|c| set.find(c).is_some_and(|i| (i as u8) < size))
    });
    if !valid {
        return None;
    }
    match pattern.len() {
        1 => Some(DataType::Scalar(scalar)),
        n => Some(DataType::vec(n as u8, scalar)),
    }
}

fn combine(
    op: BinaryOp,
    lhs: &Snippet,
    rhs: &Snippet,
    ty: DataType,
    fold_kind: ScalarKind,
    promoted: bool,
) -> Combined {
    let origin = lhs.origin.join(rhs.origin);

    // Two comptime constants fold in-process when possible.
    if let (Some(a), Some(b)) = (lhs.comptime_const(), rhs.comptime_const()) {
        if let Some(folded) = scalar::fold_binary(op, a, b, fold_kind) {
            return Combined {
                snippet: Snippet {
                    value: SnippetValue::Const(folded),
                    ty: DataType::Scalar(folded.kind()),
                    origin,
                },
                promoted,
            };
        }
    }

    Combined {
        snippet: Snippet::new(
            format!("({} {} {})", lhs.render(), op.token(), rhs.render()),
            ty,
            origin,
        ),
        promoted,
    }
}

/// Broadcast two scalar/vector shapes; the kind is handled separately.
fn broadcast_shape(a: &DataType, b: &DataType) -> Option<DataType> {
    match (a, b) {
        (DataType::Scalar(_), DataType::Scalar(_)) => Some(a.clone()),
        (DataType::Vector { size: n, .. }, DataType::Vector { size: m, .. }) if n == m => {
            Some(a.clone())
        }
        (DataType::Vector { .. }, DataType::Scalar(_)) => Some(a.clone()),
        (DataType::Scalar(_), DataType::Vector { .. }) => Some(b.clone()),
        _ => None,
    }
}

fn shape_with_kind(shape: &DataType, kind: ScalarKind) -> DataType {
    match shape {
        DataType::Vector { size, .. } => DataType::vec(*size, kind),
        _ => DataType::Scalar(kind),
    }
}

/// Result type of `lhs * rhs` when at least one side is a matrix.
fn matrix_mul_type(lhs: &DataType, rhs: &DataType) -> Option<DataType> {
    match (lhs, rhs) {
        (
            DataType::Matrix { cols, rows, scalar },
            DataType::Vector { size, scalar: vk },
        ) if size == cols && scalar == vk => Some(DataType::vec(*rows, *scalar)),
        (
            DataType::Vector { size, scalar: vk },
            DataType::Matrix { cols, rows, scalar },
        ) if size == rows && scalar == vk => Some(DataType::vec(*cols, *scalar)),
        (
            DataType::Matrix {
                cols: k1,
                rows,
                scalar,
            },
            DataType::Matrix {
                cols,
                rows: k2,
                scalar: sk,
            },
        ) if k1 == k2 && scalar == sk => Some(DataType::Matrix {
            cols: *cols,
            rows: *rows,
            scalar: *scalar,
        }),
        (DataType::Matrix { .. }, DataType::Scalar(k)) if lhs.scalar_kind() == Some(*k) => {
            Some(lhs.clone())
        }
        (DataType::Scalar(k), DataType::Matrix { .. }) if rhs.scalar_kind() == Some(*k) => {
            Some(rhs.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_int(v: i64) -> Snippet {
        Snippet::constant(ConstValue::AbstractInt(v))
    }

    fn lit_f32(v: f32) -> Snippet {
        Snippet::constant(ConstValue::F32(v))
    }

    fn runtime_f32(text: &str, origin: Origin) -> Snippet {
        Snippet::new(text, DataType::f32(), origin)
    }

    #[test]
    fn test_origin_join_least_available_wins() {
        assert_eq!(Origin::Constant.join(Origin::Constant), Origin::Constant);
        assert_eq!(Origin::Constant.join(Origin::Comptime), Origin::Comptime);
        assert_eq!(
            Origin::Local.join(Origin::StorageReadWrite),
            Origin::StorageReadWrite
        );
        assert_eq!(Origin::Uniform.join(Origin::Private), Origin::Uniform);
    }

    #[test]
    fn test_constant_operands_fold_to_constant() {
        let out = binary(BinaryOp::Add, &lit_int(2), &lit_int(3)).unwrap();
        assert_eq!(out.snippet.origin, Origin::Constant);
        assert_eq!(
            out.snippet.comptime_const(),
            Some(&ConstValue::AbstractInt(5))
        );
    }

    #[test]
    fn test_storage_operand_taints_result() {
        let storage = runtime_f32("data[i]", Origin::StorageRead);
        let out = binary(BinaryOp::Mul, &lit_f32(2.0), &storage).unwrap();
        assert_eq!(out.snippet.origin, Origin::StorageRead);
        assert_eq!(out.snippet.render(), "(2.0f * data[i])");
    }

    #[test]
    fn test_promotion_flag_on_concrete_mix() {
        let a = Snippet::new("a", DataType::i32(), Origin::Local);
        let b = runtime_f32("b", Origin::Local);
        let out = binary(BinaryOp::Add, &a, &b).unwrap();
        assert!(out.promoted);
        assert_eq!(out.snippet.ty, DataType::f32());
    }

    #[test]
    fn test_abstract_literal_adapts_without_promotion() {
        let b = runtime_f32("b", Origin::Local);
        let out = binary(BinaryOp::Add, &lit_int(1), &b).unwrap();
        assert!(!out.promoted);
        assert_eq!(out.snippet.ty, DataType::f32());
    }

    #[test]
    fn test_comparison_yields_bool_shape() {
        let a = Snippet::new("a", DataType::vec3f(), Origin::Local);
        let b = Snippet::new("b", DataType::vec3f(), Origin::Local);
        let out = binary(BinaryOp::Lt, &a, &b).unwrap();
        assert_eq!(out.snippet.ty, DataType::vec(3, ScalarKind::Bool));
    }

    #[test]
    fn test_vector_scalar_broadcast() {
        let v = Snippet::new("v", DataType::vec3f(), Origin::Local);
        let out = binary(BinaryOp::Mul, &v, &lit_f32(2.0)).unwrap();
        assert_eq!(out.snippet.ty, DataType::vec3f());
    }

    #[test]
    fn test_matrix_vector_product() {
        let m = Snippet::new("m", DataType::mat(4, 4), Origin::Uniform);
        let v = Snippet::new("v", DataType::vec4f(), Origin::Local);
        let out = binary(BinaryOp::Mul, &m, &v).unwrap();
        assert_eq!(out.snippet.ty, DataType::vec4f());
        assert_eq!(out.snippet.origin, Origin::Uniform);
    }

    #[test]
    fn test_bool_arithmetic_rejected() {
        let a = Snippet::constant(ConstValue::Bool(true));
        let err = binary(BinaryOp::Add, &a, &lit_int(1)).unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn test_negate_unsigned_rejected() {
        let a = Snippet::new("a", DataType::u32(), Origin::Local);
        assert!(unary(UnaryOp::Neg, &a).is_err());
    }

    #[test]
    fn test_swizzle() {
        let v = Snippet::new("v", DataType::vec3f(), Origin::Local);
        let xy = access_member(&v, "xy").unwrap();
        assert_eq!(xy.ty, DataType::vec2f());
        assert_eq!(xy.render(), "v.xy");

        let x = access_member(&v, "x").unwrap();
        assert_eq!(x.ty, DataType::f32());

        // w is out of range for a vec3
        assert!(access_member(&v, "w").is_err());
        // mixed sets are invalid
        assert!(access_member(&v, "xg").is_err());
    }

    #[test]
    fn test_struct_member_access() {
        let st = crate::StructType::new("P")
            .field("pos", DataType::vec3f())
            .build();
        let v = Snippet::new("p", st.ty(), Origin::StorageRead);
        let pos = access_member(&v, "pos").unwrap();
        assert_eq!(pos.ty, DataType::vec3f());
        assert_eq!(pos.origin, Origin::StorageRead);

        let err = access_member(&v, "vel").unwrap_err();
        assert!(matches!(err, TypeError::PropertyNotFound { .. }));
    }
}
