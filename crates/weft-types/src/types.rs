//! WGSL-level type descriptors.
//!
//! [`DataType`] describes every shader-side type the cross-compiler can
//! talk about: scalars, vectors, matrices, arrays, structs, pointers,
//! atomics, and the opaque handle types (samplers, texture views).
//!
//! Struct types are *schemas*: an ordered field list with optional explicit
//! `@align`/`@size` overrides, shared by value identity through
//! [`StructHandle`]. The same schema is the source of truth for emitted
//! text and for host-side binary layout, so the two can never disagree.

use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::scalar::ScalarKind;

/// WGSL address space of a pointer or module-scope variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressSpace {
    /// Function-local storage.
    Function,
    /// Module-scope private storage.
    Private,
    /// Workgroup-shared storage.
    Workgroup,
    /// Uniform buffer binding.
    Uniform,
    /// Storage buffer binding.
    Storage,
}

impl AddressSpace {
    /// WGSL spelling used inside `var<...>` and `ptr<...>`.
    pub fn wgsl(self) -> &'static str {
        match self {
            AddressSpace::Function => "function",
            AddressSpace::Private => "private",
            AddressSpace::Workgroup => "workgroup",
            AddressSpace::Uniform => "uniform",
            AddressSpace::Storage => "storage",
        }
    }
}

/// Access mode of a storage binding or storage pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    /// WGSL spelling (`read` / `read_write`).
    pub fn wgsl(self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::ReadWrite => "read_write",
        }
    }
}

/// One field of a struct schema.
///
/// `align` and `size` are explicit layout overrides; when present they are
/// reproduced in emitted text in exactly this order: alignment, then size,
/// then the field itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    pub name: String,
    pub ty: DataType,
    pub align: Option<u32>,
    pub size: Option<u32>,
}

/// A struct schema: preferred name plus ordered fields.
///
/// Build one with the fluent constructors and freeze it into a
/// [`StructHandle`]:
///
/// ```
/// use weft_types::{DataType, StructType};
///
/// let particle = StructType::new("Particle")
///     .field("pos", DataType::vec3f())
///     .field("mass", DataType::f32())
///     .build();
/// assert_eq!(particle.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructType {
    name: String,
    fields: Vec<StructField>,
}

impl StructType {
    /// Start a schema with the given preferred name.
    ///
    /// The final emitted name is chosen by the resolution namespace; this
    /// name is only a preference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, ty: DataType) -> Self {
        self.fields.push(StructField {
            name: name.into(),
            ty,
            align: None,
            size: None,
        });
        self
    }

    /// Append a field with explicit layout overrides.
    pub fn field_layout(
        mut self,
        name: impl Into<String>,
        ty: DataType,
        align: Option<u32>,
        size: Option<u32>,
    ) -> Self {
        self.fields.push(StructField {
            name: name.into(),
            ty,
            align,
            size,
        });
        self
    }

    /// Freeze the schema into a shared handle.
    pub fn build(self) -> StructHandle {
        StructHandle(Arc::new(self))
    }

    /// The preferred (pre-namespace) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered field list.
    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field_named(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Shared, identity-compared handle to a struct schema.
///
/// Two handles are equal when they point at the *same* schema object, not
/// when their schemas are structurally alike; declaration dedup is keyed on
/// this identity.
#[derive(Debug, Clone, Serialize)]
pub struct StructHandle(Arc<StructType>);

impl StructHandle {
    /// The schema this handle refers to.
    pub fn def(&self) -> &StructType {
        &self.0
    }

    /// Stable in-process identity token; dedup keys are built from it.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// This struct as a [`DataType`].
    pub fn ty(&self) -> DataType {
        DataType::Struct(self.clone())
    }
}

impl std::ops::Deref for StructHandle {
    type Target = StructType;

    fn deref(&self) -> &StructType {
        &self.0
    }
}

impl PartialEq for StructHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StructHandle {}

impl Hash for StructHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// A WGSL-level type descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataType {
    /// No value (function without a return type).
    Void,
    /// Scalar.
    Scalar(ScalarKind),
    /// `vecN<T>`, N in 2..=4.
    Vector { size: u8, scalar: ScalarKind },
    /// `matCxR<T>`, C/R in 2..=4, T floating.
    Matrix { cols: u8, rows: u8, scalar: ScalarKind },
    /// `array<T, N>` (sized) or `array<T>` (runtime-sized).
    Array {
        elem: Box<DataType>,
        len: Option<u32>,
    },
    /// User struct, by schema identity.
    Struct(StructHandle),
    /// `ptr<space, T, access>`.
    Ptr {
        space: AddressSpace,
        access: AccessMode,
        inner: Box<DataType>,
    },
    /// `atomic<T>`, T in {i32, u32}.
    Atomic(ScalarKind),
    /// Opaque sampler handle.
    Sampler,
    /// Opaque sampled 2D texture view (f32 texel type).
    Texture2d,
}

impl DataType {
    /// `bool`
    pub const fn bool() -> Self {
        DataType::Scalar(ScalarKind::Bool)
    }

    /// `i32`
    pub const fn i32() -> Self {
        DataType::Scalar(ScalarKind::I32)
    }

    /// `u32`
    pub const fn u32() -> Self {
        DataType::Scalar(ScalarKind::U32)
    }

    /// `f32`
    pub const fn f32() -> Self {
        DataType::Scalar(ScalarKind::F32)
    }

    /// `vecN<T>`
    pub const fn vec(size: u8, scalar: ScalarKind) -> Self {
        DataType::Vector { size, scalar }
    }

    /// `vec2<f32>`
    pub const fn vec2f() -> Self {
        Self::vec(2, ScalarKind::F32)
    }

    /// `vec3<f32>`
    pub const fn vec3f() -> Self {
        Self::vec(3, ScalarKind::F32)
    }

    /// `vec4<f32>`
    pub const fn vec4f() -> Self {
        Self::vec(4, ScalarKind::F32)
    }

    /// `vec3<u32>`
    pub const fn vec3u() -> Self {
        Self::vec(3, ScalarKind::U32)
    }

    /// `matCxR<f32>`
    pub const fn mat(cols: u8, rows: u8) -> Self {
        DataType::Matrix {
            cols,
            rows,
            scalar: ScalarKind::F32,
        }
    }

    /// Sized `array<T, N>`.
    pub fn array(elem: DataType, len: u32) -> Self {
        DataType::Array {
            elem: Box::new(elem),
            len: Some(len),
        }
    }

    /// Runtime-sized `array<T>`.
    pub fn runtime_array(elem: DataType) -> Self {
        DataType::Array {
            elem: Box::new(elem),
            len: None,
        }
    }

    /// `ptr<space, T, access>`
    pub fn ptr(space: AddressSpace, inner: DataType, access: AccessMode) -> Self {
        DataType::Ptr {
            space,
            access,
            inner: Box::new(inner),
        }
    }

    /// The scalar component kind, for scalars/vectors/matrices.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            DataType::Scalar(k) => Some(*k),
            DataType::Vector { scalar, .. } => Some(*scalar),
            DataType::Matrix { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// Component count: 1 for scalars, N for vectors.
    pub fn component_count(&self) -> Option<u8> {
        match self {
            DataType::Scalar(_) => Some(1),
            DataType::Vector { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// Check if this is a scalar type.
    pub fn is_scalar(&self) -> bool {
        matches!(self, DataType::Scalar(_))
    }

    /// Check if this is a vector type.
    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::Vector { .. })
    }

    /// Check if this is a pointer type.
    pub fn is_ptr(&self) -> bool {
        matches!(self, DataType::Ptr { .. })
    }

    /// Check if this is a numeric scalar or vector.
    pub fn is_numeric(&self) -> bool {
        self.scalar_kind().is_some_and(|k| k.is_numeric()) && !matches!(self, DataType::Matrix { .. })
    }

    /// Check if this is an opaque handle type (sampler, texture view).
    pub fn is_opaque(&self) -> bool {
        matches!(self, DataType::Sampler | DataType::Texture2d)
    }

    /// Check if this is the scalar boolean type.
    pub fn is_bool(&self) -> bool {
        matches!(self, DataType::Scalar(ScalarKind::Bool))
    }

    /// Check if values of this type can be constructed and passed by value
    /// in shader code.
    pub fn is_constructible(&self) -> bool {
        match self {
            DataType::Scalar(_) | DataType::Vector { .. } | DataType::Matrix { .. } => true,
            DataType::Array { elem, len } => len.is_some() && elem.is_constructible(),
            DataType::Struct(handle) => handle.fields().iter().all(|f| f.ty.is_constructible()),
            _ => false,
        }
    }

    /// Recursively materialize abstract scalar kinds.
    pub fn concretize(&self) -> DataType {
        match self {
            DataType::Scalar(k) => DataType::Scalar(k.concretize()),
            DataType::Vector { size, scalar } => DataType::Vector {
                size: *size,
                scalar: scalar.concretize(),
            },
            DataType::Array { elem, len } => DataType::Array {
                elem: Box::new(elem.concretize()),
                len: *len,
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void => write!(f, "void"),
            DataType::Scalar(k) => write!(f, "{k}"),
            DataType::Vector { size, scalar } => write!(f, "vec{size}<{scalar}>"),
            DataType::Matrix { cols, rows, scalar } => write!(f, "mat{cols}x{rows}<{scalar}>"),
            DataType::Array { elem, len: Some(n) } => write!(f, "array<{elem}, {n}>"),
            DataType::Array { elem, len: None } => write!(f, "array<{elem}>"),
            DataType::Struct(handle) => write!(f, "{}", handle.name()),
            DataType::Ptr {
                space,
                access,
                inner,
            } => write!(f, "ptr<{}, {inner}, {}>", space.wgsl(), access.wgsl()),
            DataType::Atomic(k) => write!(f, "atomic<{k}>"),
            DataType::Sampler => write!(f, "sampler"),
            DataType::Texture2d => write!(f, "texture_2d<f32>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_identity_not_structure() {
        let a = StructType::new("P").field("x", DataType::f32()).build();
        let b = StructType::new("P").field("x", DataType::f32()).build();
        let a2 = a.clone();

        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_constructible() {
        assert!(DataType::vec3f().is_constructible());
        assert!(DataType::array(DataType::f32(), 4).is_constructible());
        assert!(!DataType::runtime_array(DataType::f32()).is_constructible());
        assert!(!DataType::Sampler.is_constructible());
        assert!(!DataType::ptr(AddressSpace::Function, DataType::f32(), AccessMode::ReadWrite)
            .is_constructible());
    }

    #[test]
    fn test_concretize() {
        let abstract_vec = DataType::vec(3, ScalarKind::AbstractFloat);
        assert_eq!(abstract_vec.concretize(), DataType::vec3f());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::vec3f().to_string(), "vec3<f32>");
        assert_eq!(
            DataType::runtime_array(DataType::u32()).to_string(),
            "array<u32>"
        );
        let p = DataType::ptr(AddressSpace::Storage, DataType::f32(), AccessMode::ReadWrite);
        assert_eq!(p.to_string(), "ptr<storage, f32, read_write>");
    }
}
