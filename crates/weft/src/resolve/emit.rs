//! Declaration rendering and final program assembly.
//!
//! Struct and global declarations render here, types render against the
//! namespace's final names, and the assembled program is: struct
//! declarations, then globals/bindings, then functions in dependency
//! order, then entry bodies: UTF-8, newline-separated, no header or
//! footer.

use weft_types::{DataType, StructHandle};

use crate::error::{ErrorKind, ResolveResult};
use crate::program::{GlobalHandle, GlobalSpace};
use crate::resolve::declarations::{DeclId, DeclKind};
use crate::resolve::namespace::{check_identifier, NameKey};
use crate::resolve::Run;

impl Run<'_> {
    /// Name a struct schema and render its declaration once.
    pub(crate) fn ensure_struct(
        &mut self,
        handle: &StructHandle,
    ) -> ResolveResult<(DeclId, String)> {
        if let Some((decl, name)) = self.structs.get(&handle.identity()) {
            return Ok((*decl, name.clone()));
        }

        let claimed = self
            .ns
            .claim(NameKey::Struct(handle.identity()), handle.name())?;
        let decl = self
            .arena
            .alloc(DeclKind::Struct, claimed.name.clone(), claimed.fresh);
        // Cache before rendering fields; nested schemas resolve through
        // the same path.
        self.structs
            .insert(handle.identity(), (decl, claimed.name.clone()));

        self.trail.push(format!("struct:{}", handle.name()));
        let mut deps = Vec::new();
        let mut lines = Vec::with_capacity(handle.fields().len() + 2);
        lines.push(format!("struct {} {{", claimed.name));
        for field in handle.fields() {
            check_identifier(&field.name).map_err(|reason| {
                self.err(ErrorKind::IllegalIdentifier, reason)
                    .with_value(&field.name)
            })?;
            let ty_text = self.render_type(&field.ty, &mut deps)?;
            // Explicit overrides reproduce in a fixed order: alignment,
            // then size, then the field.
            let mut attrs = String::new();
            if let Some(align) = field.align {
                attrs.push_str(&format!("@align({align}) "));
            }
            if let Some(size) = field.size {
                attrs.push_str(&format!("@size({size}) "));
            }
            lines.push(format!("    {attrs}{}: {ty_text},", field.name));
        }
        lines.push("}".to_string());
        self.arena.finish(decl, lines.join("\n"), deps)?;
        self.trail.pop();

        Ok((decl, claimed.name))
    }

    /// Name a module-scope variable and render its declaration once.
    pub(crate) fn ensure_global(
        &mut self,
        handle: &GlobalHandle,
    ) -> ResolveResult<(DeclId, String)> {
        if let Some((decl, name)) = self.globals.get(&handle.identity()) {
            return Ok((*decl, name.clone()));
        }

        let claimed = self
            .ns
            .claim(NameKey::Global(handle.identity()), handle.name())?;
        let decl = self
            .arena
            .alloc(DeclKind::Global, claimed.name.clone(), claimed.fresh);
        self.globals
            .insert(handle.identity(), (decl, claimed.name.clone()));

        self.trail.push(format!("var:{}", handle.name()));
        let mut deps = Vec::new();
        let ty_text = self.render_type(handle.ty(), &mut deps)?;
        let name = &claimed.name;
        let text = match handle.space() {
            GlobalSpace::Private { init: None } => format!("var<private> {name}: {ty_text};"),
            GlobalSpace::Private { init: Some(v) } => {
                format!("var<private> {name}: {ty_text} = {};", v.wgsl_literal())
            }
            GlobalSpace::Workgroup => format!("var<workgroup> {name}: {ty_text};"),
            GlobalSpace::Uniform { group, binding } => {
                format!("@group({group}) @binding({binding}) var<uniform> {name}: {ty_text};")
            }
            GlobalSpace::Storage {
                group,
                binding,
                access,
            } => format!(
                "@group({group}) @binding({binding}) var<storage, {}> {name}: {ty_text};",
                access.wgsl()
            ),
            GlobalSpace::Handle { group, binding } => {
                format!("@group({group}) @binding({binding}) var {name}: {ty_text};")
            }
        };
        self.arena.finish(decl, text, deps)?;
        self.trail.pop();

        Ok((decl, claimed.name))
    }

    /// Render a type, resolving struct names and recording dependencies.
    pub(crate) fn render_type(
        &mut self,
        ty: &DataType,
        deps: &mut Vec<DeclId>,
    ) -> ResolveResult<String> {
        Ok(match ty {
            DataType::Void => {
                return Err(self.err(ErrorKind::Internal, "void is not a renderable type"))
            }
            DataType::Scalar(k) => k.wgsl().to_string(),
            DataType::Vector { size, scalar } => format!("vec{size}<{}>", scalar.wgsl()),
            DataType::Matrix { cols, rows, scalar } => {
                format!("mat{cols}x{rows}<{}>", scalar.wgsl())
            }
            DataType::Array { elem, len: Some(n) } => {
                format!("array<{}, {n}>", self.render_type(elem, deps)?)
            }
            DataType::Array { elem, len: None } => {
                format!("array<{}>", self.render_type(elem, deps)?)
            }
            DataType::Struct(handle) => {
                let (decl, name) = self.ensure_struct(handle)?;
                deps.push(decl);
                name
            }
            DataType::Ptr {
                space,
                access,
                inner,
            } => {
                let inner = self.render_type(inner, deps)?;
                if matches!(space, weft_types::AddressSpace::Storage) {
                    format!("ptr<storage, {inner}, {}>", access.wgsl())
                } else {
                    format!("ptr<{}, {inner}>", space.wgsl())
                }
            }
            DataType::Atomic(k) => format!("atomic<{}>", k.wgsl()),
            DataType::Sampler => "sampler".to_string(),
            DataType::Texture2d => "texture_2d<f32>".to_string(),
        })
    }

    /// Assemble the final program from the entry roots.
    pub(crate) fn assemble(&self, roots: &[DeclId]) -> String {
        let ordered = self.arena.closure(roots);
        let group = |kind: DeclKind| {
            ordered
                .iter()
                .map(|&id| self.arena.get(id))
                .filter(move |d| d.kind == kind && d.emit && !d.text.is_empty())
                .map(|d| d.text.as_str())
        };

        let mut parts: Vec<&str> = Vec::new();
        parts.extend(group(DeclKind::Struct));
        parts.extend(group(DeclKind::Global));
        parts.extend(group(DeclKind::Function));
        parts.extend(group(DeclKind::Entry));
        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }
}
