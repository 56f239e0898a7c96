//! The input surface the resource/binding layer hands to resolution.
//!
//! A program is described by values, not source text: function definitions
//! ([`ShaderFn`]) with an explicit externals map, module-scope variables
//! ([`GlobalVar`]) already carrying their bind points, comptime slots
//! ([`Slot`]) for data-flow overrides, and [`EntryPoint`]s tying functions
//! to pipeline stages. All of these are shared by identity through
//! cheaply-clonable handles; declaration dedup is keyed on that identity.

use indexmap::IndexMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use weft_ast::FnDef;
use weft_types::{AccessMode, AddressSpace, ConstValue, DataType, Origin, StructHandle};

macro_rules! identity_handle {
    ($(#[$meta:meta])* $handle:ident => $inner:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $handle(Arc<$inner>);

        impl $handle {
            /// Stable in-process identity token.
            pub(crate) fn identity(&self) -> usize {
                Arc::as_ptr(&self.0) as usize
            }
        }

        impl std::ops::Deref for $handle {
            type Target = $inner;

            fn deref(&self) -> &$inner {
                &self.0
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $handle {}

        impl Hash for $handle {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.identity().hash(state);
            }
        }
    };
}

/// Anything a function body can name besides its own locals and params.
#[derive(Debug, Clone, PartialEq)]
pub enum External {
    /// Another user function.
    Fn(FnHandle),
    /// A struct constructor.
    Struct(StructHandle),
    /// A module-scope variable or bound resource.
    Global(GlobalHandle),
    /// A host-provided constant.
    Const(ConstValue),
    /// A comptime slot, read from the active data-flow overrides.
    Slot(SlotHandle),
}

/// A function definition plus the externals its body may reference.
///
/// ```
/// use weft::ShaderFn;
/// use weft_ast::{Block, Expr, FnDef, Param, Stmt};
///
/// let double = ShaderFn::new(FnDef::new(
///     "double",
///     vec![Param::auto("x")],
///     Block::new([Stmt::ret(Expr::mul(Expr::ident("x"), Expr::int(2)))]),
/// ))
/// .build();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderFn {
    def: FnDef,
    externals: IndexMap<String, External>,
}

impl ShaderFn {
    /// Wrap a definition with an empty externals map.
    pub fn new(def: FnDef) -> Self {
        Self {
            def,
            externals: IndexMap::new(),
        }
    }

    /// Bind an external under the name the body uses for it.
    pub fn with(mut self, name: impl Into<String>, external: External) -> Self {
        self.externals.insert(name.into(), external);
        self
    }

    /// Freeze into a shared handle.
    pub fn build(self) -> FnHandle {
        FnHandle(Arc::new(self))
    }

    /// The wrapped definition.
    pub fn def(&self) -> &FnDef {
        &self.def
    }

    /// The externals map.
    pub fn externals(&self) -> &IndexMap<String, External> {
        &self.externals
    }
}

identity_handle! {
    /// Shared, identity-compared handle to a [`ShaderFn`].
    FnHandle => ShaderFn
}

/// Address-space specific details of a module-scope variable.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalSpace {
    /// `var<private>` with optional initializer.
    Private { init: Option<ConstValue> },
    /// `var<workgroup>`.
    Workgroup,
    /// `var<uniform>` binding.
    Uniform { group: u32, binding: u32 },
    /// `var<storage, ...>` binding.
    Storage {
        group: u32,
        binding: u32,
        access: AccessMode,
    },
    /// Opaque handle binding (sampler, texture view).
    Handle { group: u32, binding: u32 },
}

/// A module-scope variable or bound resource.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    name: String,
    ty: DataType,
    space: GlobalSpace,
}

impl GlobalVar {
    /// `var<private>` with no initializer.
    pub fn private(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Private { init: None },
        }
    }

    /// `var<private>` with an initializer.
    pub fn private_init(name: impl Into<String>, ty: DataType, init: ConstValue) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Private { init: Some(init) },
        }
    }

    /// `var<workgroup>`.
    pub fn workgroup(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Workgroup,
        }
    }

    /// Uniform binding.
    pub fn uniform(name: impl Into<String>, ty: DataType, group: u32, binding: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Uniform { group, binding },
        }
    }

    /// Storage binding.
    pub fn storage(
        name: impl Into<String>,
        ty: DataType,
        group: u32,
        binding: u32,
        access: AccessMode,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Storage {
                group,
                binding,
                access,
            },
        }
    }

    /// Opaque handle binding (sampler, texture view).
    pub fn handle(name: impl Into<String>, ty: DataType, group: u32, binding: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            space: GlobalSpace::Handle { group, binding },
        }
    }

    /// Freeze into a shared handle.
    pub fn build(self) -> GlobalHandle {
        GlobalHandle(Arc::new(self))
    }

    /// The preferred (pre-namespace) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable's type.
    pub fn ty(&self) -> &DataType {
        &self.ty
    }

    /// Address-space details.
    pub fn space(&self) -> &GlobalSpace {
        &self.space
    }

    /// The snippet origin values read from this variable carry.
    pub fn origin(&self) -> Origin {
        match &self.space {
            GlobalSpace::Private { .. } => Origin::Private,
            GlobalSpace::Workgroup => Origin::Workgroup,
            GlobalSpace::Uniform { .. } => Origin::Uniform,
            GlobalSpace::Storage {
                access: AccessMode::Read,
                ..
            } => Origin::StorageRead,
            GlobalSpace::Storage {
                access: AccessMode::ReadWrite,
                ..
            } => Origin::StorageReadWrite,
            GlobalSpace::Handle { .. } => Origin::Uniform,
        }
    }

    /// The address space and access a reference into this variable gets,
    /// if references into it are allowed at all.
    pub fn ref_space(&self) -> Option<(AddressSpace, AccessMode)> {
        match &self.space {
            GlobalSpace::Private { .. } => Some((AddressSpace::Private, AccessMode::ReadWrite)),
            GlobalSpace::Workgroup => Some((AddressSpace::Workgroup, AccessMode::ReadWrite)),
            GlobalSpace::Storage { access, .. } => Some((AddressSpace::Storage, *access)),
            GlobalSpace::Uniform { .. } | GlobalSpace::Handle { .. } => None,
        }
    }
}

identity_handle! {
    /// Shared, identity-compared handle to a [`GlobalVar`].
    GlobalHandle => GlobalVar
}

/// A comptime slot: a named hole filled by data-flow overrides at
/// resolution time, with an optional default.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    name: String,
    default: Option<ConstValue>,
}

impl Slot {
    /// A slot with no default; resolution fails if nothing binds it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A slot with a default value.
    pub fn with_default(name: impl Into<String>, default: ConstValue) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    /// Freeze into a shared handle.
    pub fn build(self) -> SlotHandle {
        SlotHandle(Arc::new(self))
    }

    /// The slot's name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default value, if any.
    pub fn default_value(&self) -> Option<&ConstValue> {
        self.default.as_ref()
    }
}

identity_handle! {
    /// Shared, identity-compared handle to a [`Slot`].
    SlotHandle => Slot
}

/// Stage-interface values produced or consumed by the fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinValue {
    Position,
    VertexIndex,
    InstanceIndex,
    FragDepth,
    GlobalInvocationId,
    LocalInvocationId,
    WorkgroupId,
}

impl BuiltinValue {
    /// WGSL spelling inside `@builtin(...)`.
    pub fn wgsl(self) -> &'static str {
        match self {
            BuiltinValue::Position => "position",
            BuiltinValue::VertexIndex => "vertex_index",
            BuiltinValue::InstanceIndex => "instance_index",
            BuiltinValue::FragDepth => "frag_depth",
            BuiltinValue::GlobalInvocationId => "global_invocation_id",
            BuiltinValue::LocalInvocationId => "local_invocation_id",
            BuiltinValue::WorkgroupId => "workgroup_id",
        }
    }
}

/// One field of a stage interface: a named value with a type and either a
/// user-assigned location or a builtin binding.
#[derive(Debug, Clone, PartialEq)]
pub struct IoField {
    pub name: String,
    pub ty: DataType,
    pub location: Option<u32>,
    pub builtin: Option<BuiltinValue>,
}

impl IoField {
    /// A user value with auto-assigned location.
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            location: None,
            builtin: None,
        }
    }

    /// A user value with an explicit location.
    pub fn at(name: impl Into<String>, ty: DataType, location: u32) -> Self {
        Self {
            name: name.into(),
            ty,
            location: Some(location),
            builtin: None,
        }
    }

    /// A builtin value.
    pub fn builtin(name: impl Into<String>, builtin: BuiltinValue, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            location: None,
            builtin: Some(builtin),
        }
    }
}

/// The pipeline stage an entry point executes in.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Compute { workgroup_size: [u32; 3] },
    Vertex,
    Fragment,
}

/// A function submitted for resolution, bound to a pipeline stage.
///
/// The function's parameters correspond positionally to `inputs`. When a
/// stage declares more than one output (or any vertex output), the body
/// returns a synthesized interface struct constructed through the injected
/// `Out` callee.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub func: FnHandle,
    pub stage: Stage,
    pub inputs: Vec<IoField>,
    pub outputs: Vec<IoField>,
}

impl EntryPoint {
    /// A compute entry point.
    pub fn compute(func: FnHandle, workgroup_size: [u32; 3]) -> Self {
        Self {
            func,
            stage: Stage::Compute { workgroup_size },
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// A vertex entry point.
    pub fn vertex(func: FnHandle) -> Self {
        Self {
            func,
            stage: Stage::Vertex,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// A fragment entry point.
    pub fn fragment(func: FnHandle) -> Self {
        Self {
            func,
            stage: Stage::Fragment,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append a stage input.
    pub fn input(mut self, field: IoField) -> Self {
        self.inputs.push(field);
        self
    }

    /// Append a stage output.
    pub fn output(mut self, field: IoField) -> Self {
        self.outputs.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::{Block, Param};

    #[test]
    fn test_fn_handle_identity() {
        let def = FnDef::new("f", vec![Param::auto("x")], Block::default());
        let a = ShaderFn::new(def.clone()).build();
        let b = ShaderFn::new(def).build();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_global_origin_mapping() {
        let g = GlobalVar::storage(
            "data",
            DataType::runtime_array(DataType::f32()),
            0,
            0,
            AccessMode::ReadWrite,
        );
        assert_eq!(g.origin(), Origin::StorageReadWrite);
        assert_eq!(
            g.ref_space(),
            Some((AddressSpace::Storage, AccessMode::ReadWrite))
        );

        let u = GlobalVar::uniform("params", DataType::f32(), 0, 1);
        assert_eq!(u.origin(), Origin::Uniform);
        assert_eq!(u.ref_space(), None);
    }
}
