//! Function monomorphization.
//!
//! A type-agnostic definition becomes one emitted body per distinct
//! specialization key: (function identity, argument-type tuple,
//! active-binding tuple). The cache is also the visited set for cyclic
//! call graphs: a slot is named and cached *before* its body transpiles,
//! so a recursive call hits the cache and renders against the final name.

use weft_ast::{referenced_idents, ParamType};
use weft_types::{scalar, DataType, Origin, Snippet};

use crate::error::{ErrorKind, ResolveResult};
use crate::program::FnHandle;
use crate::resolve::declarations::{DeclId, DeclKind};
use crate::resolve::namespace::{check_identifier, NameKey};
use crate::resolve::Run;
use crate::transpile::scope::ScopeEntry;
use crate::transpile::Transpiler;

/// Everything a call site needs from a specialization.
#[derive(Debug, Clone)]
pub(crate) struct CallTarget {
    pub name: String,
    pub decl: DeclId,
    /// Per-argument: does the emitted signature keep this argument?
    pub keep: Vec<bool>,
    pub ret: DataType,
}

/// A cached specialization.
#[derive(Debug, Clone)]
pub(crate) struct SpecEntry {
    pub decl: DeclId,
    pub name: String,
    pub keep: Vec<bool>,
    /// `None` while the body is still transpiling (recursive discovery).
    pub ret: Option<DataType>,
}

/// Canonical key fragment for a type, stable within one process.
///
/// Structs key on schema identity, not on their (possibly renamed)
/// emitted name.
pub(crate) fn type_key(ty: &DataType) -> String {
    match ty {
        DataType::Struct(handle) => format!("struct#{:x}", handle.identity()),
        DataType::Array { elem, len: Some(n) } => format!("array<{}, {n}>", type_key(elem)),
        DataType::Array { elem, len: None } => format!("array<{}>", type_key(elem)),
        DataType::Ptr {
            space,
            access,
            inner,
        } => format!("ptr<{}, {}, {}>", space.wgsl(), type_key(inner), access.wgsl()),
        other => other.to_string(),
    }
}

impl Run<'_> {
    /// Resolve a call to `handle` with the given concrete arguments,
    /// reusing an existing specialization when the key matches.
    pub(crate) fn specialize(
        &mut self,
        handle: &FnHandle,
        args: &[Snippet],
    ) -> ResolveResult<CallTarget> {
        let def = handle.def().clone();

        if def.params.len() != args.len() {
            return Err(self.err(
                ErrorKind::TypeUnification,
                format!(
                    "'{}' takes {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    args.len()
                ),
            ));
        }

        // Bind parameter types from the call.
        let mut param_tys = Vec::with_capacity(args.len());
        for (param, arg) in def.params.iter().zip(args) {
            let ty = match &param.ty {
                ParamType::Typed(declared) => {
                    self.check_arg_against(&def.name, &param.name, arg, declared)?;
                    declared.clone()
                }
                ParamType::Auto => {
                    let ty = arg.ty.concretize();
                    if ty == DataType::Void {
                        return Err(self
                            .err(
                                ErrorKind::TypeUnification,
                                format!(
                                    "argument for '{}' of '{}' has no value",
                                    param.name, def.name
                                ),
                            )
                            .with_value(arg.render()));
                    }
                    ty
                }
                ParamType::Ref => {
                    if !arg.ty.is_ptr() {
                        return Err(self
                            .err(
                                ErrorKind::TypeUnification,
                                format!(
                                    "parameter '{}' of '{}' expects a reference",
                                    param.name, def.name
                                ),
                            )
                            .with_value(arg.render())
                            .with_note("pass one with ref(some_var)"));
                    }
                    // The pointer's address space rode in on the argument
                    // type, so the inference is already transitive.
                    arg.ty.clone()
                }
            };
            param_tys.push(ty);
        }

        let sig = format!(
            "{};{}",
            param_tys.iter().map(type_key).collect::<Vec<_>>().join(","),
            self.bindings_key
        );
        let cache_key = format!("{:x}|{sig}", handle.identity());

        if let Some(entry) = self.specs.get(&cache_key) {
            let ret = entry.ret.clone().ok_or_else(|| {
                self.err(
                    ErrorKind::UnsupportedConstruct,
                    format!(
                        "recursive call to '{}' requires a declared return type",
                        def.name
                    ),
                )
                .with_note("declare it: FnDef::new(...).returns(ty)")
            })?;
            return Ok(CallTarget {
                name: entry.name.clone(),
                decl: entry.decl,
                keep: entry.keep.clone(),
                ret,
            });
        }

        // Miss: name and register the slot before touching the body, so
        // recursion terminates on the cache.
        let claimed = self
            .ns
            .claim(NameKey::Fn(handle.identity(), sig), &def.name)?;
        let decl = self
            .arena
            .alloc(DeclKind::Function, claimed.name.clone(), claimed.fresh);

        let used = referenced_idents(&def.body);
        let keep: Vec<bool> = def.params.iter().map(|p| used.contains(&p.name)).collect();

        self.specs.insert(
            cache_key.clone(),
            SpecEntry {
                decl,
                name: claimed.name.clone(),
                keep: keep.clone(),
                ret: def.ret.as_ref().map(DataType::concretize),
            },
        );

        self.trail.push(format!(
            "fn*:{}({})",
            def.name,
            param_tys
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));

        // Parameter snippets for the body's scope.
        let mut scope_params = Vec::with_capacity(def.params.len());
        for (param, ty) in def.params.iter().zip(&param_tys) {
            check_identifier(&param.name).map_err(|reason| {
                self.err(ErrorKind::IllegalIdentifier, reason)
                    .with_value(&param.name)
            })?;
            let origin = if ty.is_ptr() {
                Origin::SelfDeref
            } else {
                Origin::Local
            };
            scope_params.push((
                param.name.clone(),
                ScopeEntry::Param {
                    snippet: Snippet::new(param.name.clone(), ty.clone(), origin),
                },
            ));
        }

        let declared_ret = def.ret.as_ref().map(DataType::concretize);
        let mut walker = Transpiler::new(self, handle.externals(), scope_params);
        walker.block(&def.body)?;
        let frame = walker.finish();

        let ret = self.infer_return(&def.name, declared_ret, &frame.returns)?;

        // Render the signature; only kept parameters appear.
        let mut deps = frame.deps;
        let mut rendered_params = Vec::new();
        for ((param, ty), kept) in def.params.iter().zip(&param_tys).zip(&keep) {
            if !kept {
                continue;
            }
            let ty_text = self.render_type(ty, &mut deps)?;
            rendered_params.push(format!("{}: {ty_text}", param.name));
        }
        let header = if ret == DataType::Void {
            format!("fn {}({})", claimed.name, rendered_params.join(", "))
        } else {
            let ret_text = self.render_type(&ret, &mut deps)?;
            format!(
                "fn {}({}) -> {ret_text}",
                claimed.name,
                rendered_params.join(", ")
            )
        };
        let text = format!("{header} {{\n{}\n}}", frame.lines.join("\n"));
        self.arena.finish(decl, text, deps)?;

        if let Some(entry) = self.specs.get_mut(&cache_key) {
            entry.ret = Some(ret.clone());
        }
        self.trail.pop();

        Ok(CallTarget {
            name: claimed.name,
            decl,
            keep,
            ret,
        })
    }

    /// Check a concrete argument against a declared parameter type.
    fn check_arg_against(
        &self,
        fn_name: &str,
        param: &str,
        arg: &Snippet,
        declared: &DataType,
    ) -> ResolveResult<()> {
        if arg.ty.concretize() == declared.concretize() {
            return Ok(());
        }
        // Abstract literals adapt to the declared kind.
        if let (Some(ak), Some(dk)) = (arg.ty.scalar_kind(), declared.scalar_kind()) {
            if ak.is_abstract()
                && arg.ty.component_count() == declared.component_count()
                && scalar::unify(ak, dk).is_some_and(|u| u.kind == dk)
            {
                return Ok(());
            }
        }
        Err(self
            .err(
                ErrorKind::TypeUnification,
                format!(
                    "argument for '{param}' of '{fn_name}' has type {}, expected {}",
                    arg.ty, declared
                ),
            )
            .with_value(arg.render()))
    }

    /// Infer the return type from collected `return` statements.
    ///
    /// With a declared type, every return must match it. Without one, all
    /// returns must agree; disagreement reports every distinct type found.
    fn infer_return(
        &self,
        fn_name: &str,
        declared: Option<DataType>,
        returns: &[DataType],
    ) -> ResolveResult<DataType> {
        if let Some(declared) = declared {
            for r in returns {
                if *r != declared {
                    return Err(self.err(
                        ErrorKind::TypeUnification,
                        format!(
                            "'{fn_name}' declares return type {declared} but returns {r}"
                        ),
                    ));
                }
            }
            return Ok(declared);
        }

        let mut distinct: Vec<&DataType> = Vec::new();
        for r in returns {
            if !distinct.contains(&r) {
                distinct.push(r);
            }
        }
        match distinct.len() {
            0 => Ok(DataType::Void),
            1 => Ok(distinct[0].clone()),
            _ => Err(self.err(
                ErrorKind::TypeUnification,
                format!(
                    "return statements of '{fn_name}' disagree: found {}",
                    distinct
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        }
    }
}
