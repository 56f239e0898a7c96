//! Scalar kinds, in-process constant values, and the implicit-promotion table.
//!
//! WGSL distinguishes *abstract* numerics (untyped literals that adapt to
//! their context) from *concrete* ones. Mixing the two in an expression
//! resolves to a single kind through the promotion table in [`unify`]:
//!
//! - abstract-int adapts to any concrete numeric kind
//! - abstract-float adapts to any concrete floating kind
//! - a concrete integer mixed with a concrete float promotes to the float
//! - mixed signed/unsigned concrete integers resolve to signed
//!
//! Promotions that change a *concrete* operand's kind are flagged so the
//! transpiler can surface a one-time warning when they happen inside an
//! assignment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BinaryOp;

/// Scalar component kind of a WGSL value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Untyped integer literal (no WGSL spelling of its own).
    AbstractInt,
    /// Untyped floating literal (no WGSL spelling of its own).
    AbstractFloat,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit float.
    F32,
    /// 16-bit float.
    F16,
}

impl ScalarKind {
    /// Check if this is an abstract (literal-only) kind.
    pub fn is_abstract(self) -> bool {
        matches!(self, ScalarKind::AbstractInt | ScalarKind::AbstractFloat)
    }

    /// Check if this is an integer kind (abstract or concrete).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::AbstractInt | ScalarKind::I32 | ScalarKind::U32
        )
    }

    /// Check if this is a floating kind (abstract or concrete).
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ScalarKind::AbstractFloat | ScalarKind::F32 | ScalarKind::F16
        )
    }

    /// Check if this kind participates in arithmetic.
    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarKind::Bool)
    }

    /// Materialize an abstract kind to its default concrete kind.
    ///
    /// Abstract-int materializes as `i32`, abstract-float as `f32`,
    /// mirroring the target's own literal materialization.
    pub fn concretize(self) -> ScalarKind {
        match self {
            ScalarKind::AbstractInt => ScalarKind::I32,
            ScalarKind::AbstractFloat => ScalarKind::F32,
            other => other,
        }
    }

    /// WGSL spelling of this kind (abstract kinds materialize first).
    pub fn wgsl(self) -> &'static str {
        match self.concretize() {
            ScalarKind::Bool => "bool",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::F32 => "f32",
            ScalarKind::F16 => "f16",
            // concretize() never returns an abstract kind
            ScalarKind::AbstractInt | ScalarKind::AbstractFloat => unreachable!(),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::AbstractInt => write!(f, "abstract-int"),
            ScalarKind::AbstractFloat => write!(f, "abstract-float"),
            ScalarKind::I32 => write!(f, "i32"),
            ScalarKind::U32 => write!(f, "u32"),
            ScalarKind::F32 => write!(f, "f32"),
            ScalarKind::F16 => write!(f, "f16"),
        }
    }
}

/// Result of unifying two scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unified {
    /// The kind both operands resolve to.
    pub kind: ScalarKind,
    /// Whether a *concrete* operand changed kind to get there.
    pub promoted: bool,
}

/// Unify two scalar kinds through the implicit-promotion table.
///
/// Returns `None` when no promotion path exists (e.g. `bool` mixed with a
/// numeric kind).
pub fn unify(a: ScalarKind, b: ScalarKind) -> Option<Unified> {
    use ScalarKind::*;

    if a == b {
        return Some(Unified {
            kind: a,
            promoted: false,
        });
    }
    if a == Bool || b == Bool {
        return None;
    }

    // Order-insensitive table: try (a, b), then (b, a).
    fn table(a: ScalarKind, b: ScalarKind) -> Option<Unified> {
        use ScalarKind::*;
        let hit = |kind, promoted| Some(Unified { kind, promoted });
        match (a, b) {
            // Abstract literals adapt without touching the concrete operand.
            (AbstractInt, AbstractFloat) => hit(AbstractFloat, false),
            (AbstractInt, I32) => hit(I32, false),
            (AbstractInt, U32) => hit(U32, false),
            (AbstractInt, F32) => hit(F32, false),
            (AbstractInt, F16) => hit(F16, false),
            (AbstractFloat, F32) => hit(F32, false),
            (AbstractFloat, F16) => hit(F16, false),
            // An abstract float forces a concrete integer operand to float.
            (AbstractFloat, I32) | (AbstractFloat, U32) => hit(F32, true),
            // Concrete integer + concrete float: float wins.
            (I32, F32) | (U32, F32) => hit(F32, true),
            (I32, F16) | (U32, F16) => hit(F16, true),
            // Mixed signedness resolves to signed.
            (U32, I32) => hit(I32, true),
            // Narrow float widens.
            (F16, F32) => hit(F32, true),
            _ => None,
        }
    }

    table(a, b).or_else(|| table(b, a))
}

/// An in-process constant, carried inside snippets whose value is fully
/// known ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Bool(bool),
    AbstractInt(i64),
    AbstractFloat(f64),
    I32(i32),
    U32(u32),
    F32(f32),
}

impl ConstValue {
    /// The scalar kind of this constant.
    pub fn kind(&self) -> ScalarKind {
        match self {
            ConstValue::Bool(_) => ScalarKind::Bool,
            ConstValue::AbstractInt(_) => ScalarKind::AbstractInt,
            ConstValue::AbstractFloat(_) => ScalarKind::AbstractFloat,
            ConstValue::I32(_) => ScalarKind::I32,
            ConstValue::U32(_) => ScalarKind::U32,
            ConstValue::F32(_) => ScalarKind::F32,
        }
    }

    /// Boolean payload, if this is a boolean constant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric payload widened to `f64`, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Bool(_) => None,
            ConstValue::AbstractInt(v) => Some(*v as f64),
            ConstValue::AbstractFloat(v) => Some(*v),
            ConstValue::I32(v) => Some(*v as f64),
            ConstValue::U32(v) => Some(*v as f64),
            ConstValue::F32(v) => Some(*v as f64),
        }
    }

    /// Integer payload widened to `i64`, if this is an integer constant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstValue::AbstractInt(v) => Some(*v),
            ConstValue::I32(v) => Some(*v as i64),
            ConstValue::U32(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Convert this constant to the given kind, if representable.
    pub fn cast(&self, kind: ScalarKind) -> Option<ConstValue> {
        if self.kind() == kind {
            return Some(*self);
        }
        match kind {
            ScalarKind::Bool => self.as_bool().map(ConstValue::Bool),
            ScalarKind::AbstractInt => self.as_i64().map(ConstValue::AbstractInt),
            ScalarKind::AbstractFloat => self.as_f64().map(ConstValue::AbstractFloat),
            ScalarKind::I32 => {
                let v = self.as_i64()?;
                i32::try_from(v).ok().map(ConstValue::I32)
            }
            ScalarKind::U32 => {
                let v = self.as_i64()?;
                u32::try_from(v).ok().map(ConstValue::U32)
            }
            ScalarKind::F32 => self.as_f64().map(|v| ConstValue::F32(v as f32)),
            ScalarKind::F16 => None,
        }
    }

    /// WGSL literal spelling of this constant.
    ///
    /// Concrete kinds are suffixed (`3i`, `3u`, `1.5f`) so the literal
    /// cannot re-enter abstract materialization in the output program.
    pub fn wgsl_literal(&self) -> String {
        match self {
            ConstValue::Bool(b) => b.to_string(),
            ConstValue::AbstractInt(v) => v.to_string(),
            ConstValue::AbstractFloat(v) => format!("{v:?}"),
            ConstValue::I32(v) => format!("{v}i"),
            ConstValue::U32(v) => format!("{v}u"),
            ConstValue::F32(v) => format!("{v:?}f"),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wgsl_literal())
    }
}

/// Fold a binary operation over two constants at the given result kind.
///
/// Returns `None` when the operation cannot be folded (division by zero,
/// overflow on cast); callers fall back to emitting runtime text.
pub fn fold_binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue, kind: ScalarKind) -> Option<ConstValue> {
    use BinaryOp::*;

    // Comparisons and logical operators produce booleans; everything else
    // produces the unified operand kind.
    match op {
        And | Or => {
            let (a, b) = (lhs.as_bool()?, rhs.as_bool()?);
            let v = match op {
                And => a && b,
                _ => a || b,
            };
            return Some(ConstValue::Bool(v));
        }
        Eq | Ne | Lt | Le | Gt | Ge => {
            if kind == ScalarKind::Bool {
                let (a, b) = (lhs.as_bool()?, rhs.as_bool()?);
                return match op {
                    Eq => Some(ConstValue::Bool(a == b)),
                    Ne => Some(ConstValue::Bool(a != b)),
                    _ => None,
                };
            }
            let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
            let v = match op {
                Eq => a == b,
                Ne => a != b,
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                _ => a >= b,
            };
            return Some(ConstValue::Bool(v));
        }
        _ => {}
    }

    let lhs = lhs.cast(kind)?;
    let rhs = rhs.cast(kind)?;

    if kind.is_float() {
        let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
        let v = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => {
                if b == 0.0 {
                    return None;
                }
                a / b
            }
            Rem => {
                if b == 0.0 {
                    return None;
                }
                a % b
            }
            _ => return None,
        };
        return ConstValue::AbstractFloat(v).cast(kind);
    }

    let (a, b) = (lhs.as_i64()?, rhs.as_i64()?);
    let v = match op {
        Add => a.checked_add(b)?,
        Sub => a.checked_sub(b)?,
        Mul => a.checked_mul(b)?,
        Div => a.checked_div(b)?,
        Rem => a.checked_rem(b)?,
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        Shl => a.checked_shl(u32::try_from(b).ok()?)?,
        Shr => a.checked_shr(u32::try_from(b).ok()?)?,
        _ => return None,
    };
    ConstValue::AbstractInt(v).cast(kind)
}
