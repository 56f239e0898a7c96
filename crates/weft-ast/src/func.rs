//! Function definitions.
//!
//! A [`FnDef`] is type-agnostic until specialization: parameters may be
//! fully annotated, reference-typed, or left for inference from the call
//! site's argument types.

use serde::Serialize;
use weft_types::DataType;

use crate::stmt::Block;

/// How a parameter's type is determined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamType {
    /// Inferred from the concrete argument at each call site.
    Auto,
    /// Fixed shader type.
    Typed(DataType),
    /// Reference parameter; lowers to a pointer whose address space is
    /// inferred from how the caller obtained the reference.
    Ref,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

impl Param {
    /// Parameter with inferred type.
    pub fn auto(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Auto,
        }
    }

    /// Parameter with a fixed type.
    pub fn typed(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Typed(ty),
        }
    }

    /// Reference parameter.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Ref,
        }
    }
}

/// A function definition in the restricted subset.
///
/// `ret` is an optional declared return type; when absent the return type
/// is inferred from the body's `return` statements at specialization time.
/// Recursive functions must declare it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<DataType>,
    pub body: Block,
}

impl FnDef {
    /// Define a function.
    pub fn new(name: impl Into<String>, params: Vec<Param>, body: Block) -> Self {
        Self {
            name: name.into(),
            params,
            ret: None,
            body,
        }
    }

    /// Declare the return type explicitly.
    pub fn returns(mut self, ty: DataType) -> Self {
        self.ret = Some(ty);
        self
    }
}
