//! Whole-program resolution.
//!
//! [`ResolutionContext::resolve`] walks the dependency closure of the
//! submitted entry points depth-first: every function reachable from an
//! entry is specialized, every struct and global it touches is named and
//! rendered, and the result is assembled as structs, then globals, then
//! functions in dependency order, then entry bodies.
//!
//! The walk is single-threaded, synchronous, and re-entrant; the only
//! shared mutable state is the [`Namespace`] handed in by the caller and
//! the per-run specialization cache. Threading one namespace through
//! *sequential* resolutions is the supported way to dedupe declarations
//! across paired stages; nothing here is ambient or global.

pub(crate) mod declarations;
pub(crate) mod emit;
pub mod namespace;
pub(crate) mod specialize;
pub(crate) mod stages;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use weft_types::{ConstValue, DataType, Origin, Snippet, StructType};

use crate::error::{ErrorKind, ResolveError, ResolveResult};
use crate::log::{LogCallSite, LogConfig, LogState};
use crate::program::{BuiltinValue, EntryPoint, External, SlotHandle, Stage};
use crate::transpile::scope::ScopeEntry;
use crate::transpile::Transpiler;
use declarations::{DeclArena, DeclId, DeclKind};
use namespace::{check_identifier, NameKey, Namespace};
use specialize::SpecEntry;
use stages::IoPlan;

/// Knobs for one resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Enable the console-log subsystem with this configuration.
    pub log: Option<LogConfig>,
    /// Data-flow overrides: values bound to slots for this resolution.
    pub overrides: Vec<(SlotHandle, ConstValue)>,
}

/// A successfully resolved program.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The program text: UTF-8, newline-separated declarations, no
    /// header or footer.
    pub wgsl: String,
    /// Host-side shape registry for generated log records.
    pub log_sites: Vec<LogCallSite>,
}

/// The resolution orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    opts: ResolveOptions,
}

impl ResolutionContext {
    /// A context with the given options.
    pub fn new(opts: ResolveOptions) -> Self {
        Self { opts }
    }

    /// Resolve entry points into one program.
    ///
    /// The namespace is caller-owned so it can be threaded across
    /// sequential resolutions; a fresh namespace gives byte-identical
    /// output for identical input.
    pub fn resolve(
        &self,
        ns: &mut Namespace,
        entries: &[EntryPoint],
    ) -> ResolveResult<Resolved> {
        if entries.is_empty() {
            return Err(ResolveError::new(
                ErrorKind::UnsupportedConstruct,
                "resolution needs at least one entry point",
            ));
        }

        let mut overrides = HashMap::new();
        let mut binding_parts: Vec<(usize, String)> = Vec::new();
        for (slot, value) in &self.opts.overrides {
            overrides.insert(slot.identity(), *value);
            binding_parts.push((slot.identity(), value.wgsl_literal()));
        }
        binding_parts.sort();
        let bindings_key = binding_parts
            .iter()
            .map(|(id, v)| format!("{id:x}={v}"))
            .collect::<Vec<_>>()
            .join(",");

        let mut run = Run {
            opts: self.opts.clone(),
            ns,
            arena: DeclArena::new(),
            specs: IndexMap::new(),
            structs: IndexMap::new(),
            globals: IndexMap::new(),
            log: LogState::default(),
            warned: HashSet::new(),
            trail: vec!["<root>".to_string()],
            bindings_key,
            overrides,
        };

        let plans = stages::plan(entries);
        let mut roots = Vec::with_capacity(entries.len());
        let mut seen: IndexMap<usize, DeclId> = IndexMap::new();
        for (entry, plan) in entries.iter().zip(&plans) {
            let identity = entry.func.identity();
            if let Some(decl) = seen.get(&identity) {
                roots.push(*decl);
                continue;
            }
            let decl = run.emit_entry(entry, plan)?;
            seen.insert(identity, decl);
            roots.push(decl);
        }

        let wgsl = run.assemble(&roots);
        debug!(
            entries = entries.len(),
            bytes = wgsl.len(),
            log_sites = run.log.sites.len(),
            "resolution finished"
        );
        Ok(Resolved {
            wgsl,
            log_sites: run.log.sites,
        })
    }
}

/// Shared mutable state of one resolution run.
pub(crate) struct Run<'ns> {
    pub opts: ResolveOptions,
    pub ns: &'ns mut Namespace,
    pub arena: DeclArena,
    /// Specialization cache; doubles as the cycle visited-set.
    pub specs: IndexMap<String, SpecEntry>,
    /// Struct schema identity → declaration.
    pub structs: IndexMap<usize, (DeclId, String)>,
    /// Global identity → declaration.
    pub globals: IndexMap<usize, (DeclId, String)>,
    pub log: LogState,
    warned: HashSet<String>,
    pub trail: Vec<String>,
    /// Canonical fragment of the active-binding tuple, part of every
    /// specialization key.
    pub bindings_key: String,
    overrides: HashMap<usize, ConstValue>,
}

impl Run<'_> {
    /// An error annotated with the current breadcrumb trail.
    pub(crate) fn err(&self, kind: ErrorKind, message: impl Into<String>) -> ResolveError {
        ResolveError::new(kind, message).at(&self.trail)
    }

    /// Emit a warning once per key for this run.
    pub(crate) fn warn_once(&mut self, key: String, message: String) {
        if self.warned.insert(key) {
            warn!("{message}");
        }
    }

    /// The value bound to a slot, from overrides or the slot default.
    pub(crate) fn slot_value(&self, slot: &SlotHandle) -> Option<ConstValue> {
        self.overrides
            .get(&slot.identity())
            .copied()
            .or_else(|| slot.default_value().copied())
    }

    /// Generate one entry-point declaration.
    fn emit_entry(&mut self, entry: &EntryPoint, plan: &IoPlan) -> ResolveResult<DeclId> {
        let def = entry.func.def().clone();
        self.trail.push(format!("fn:{}", def.name));

        self.validate_entry(entry)?;
        if def.params.len() != entry.inputs.len() {
            return Err(self.err(
                ErrorKind::TypeUnification,
                format!(
                    "entry '{}' has {} parameter(s) but {} declared input(s)",
                    def.name,
                    def.params.len(),
                    entry.inputs.len()
                ),
            ));
        }

        let claimed = self
            .ns
            .claim(NameKey::Entry(entry.func.identity()), &def.name)?;
        let decl = self
            .arena
            .alloc(DeclKind::Entry, claimed.name.clone(), claimed.fresh);

        // Synthesized interface struct for multi-value outputs.
        let needs_out_struct = match entry.stage {
            Stage::Vertex => true,
            Stage::Fragment => entry.outputs.len() > 1,
            Stage::Compute { .. } => false,
        };
        let mut deps = Vec::new();
        let out_struct = if needs_out_struct {
            Some(self.emit_io_struct(entry, plan, &def.name, &mut deps)?)
        } else {
            None
        };

        // Parameters bind positionally to declared inputs.
        let mut params = Vec::with_capacity(def.params.len());
        for (param, input) in def.params.iter().zip(&entry.inputs) {
            check_identifier(&input.name).map_err(|reason| {
                self.err(ErrorKind::IllegalIdentifier, reason)
                    .with_value(&input.name)
            })?;
            params.push((
                param.name.clone(),
                ScopeEntry::Param {
                    snippet: Snippet::new(input.name.clone(), input.ty.clone(), Origin::Local),
                },
            ));
        }

        let expected_ret = match (&entry.stage, &out_struct) {
            (Stage::Compute { .. }, _) => DataType::Void,
            (_, Some((_, _, handle))) => handle.ty(),
            (Stage::Fragment, None) => entry
                .outputs
                .first()
                .map(|o| o.ty.concretize())
                .unwrap_or(DataType::Void),
            (Stage::Vertex, None) => DataType::Void,
        };

        let mut externals = entry.func.externals().clone();
        if let Some((_, _, handle)) = &out_struct {
            externals.insert("Out".to_string(), External::Struct(handle.clone()));
        }

        let mut walker = Transpiler::new(self, &externals, params);
        walker.block(&def.body)?;
        let frame = walker.finish();

        if expected_ret != DataType::Void && frame.returns.is_empty() {
            return Err(self.err(
                ErrorKind::TypeUnification,
                format!("entry '{}' must return {expected_ret}", def.name),
            ));
        }
        for ret in &frame.returns {
            if *ret != expected_ret {
                return Err(self.err(
                    ErrorKind::TypeUnification,
                    format!(
                        "entry '{}' must return {expected_ret}, found {ret}",
                        def.name
                    ),
                ));
            }
        }

        deps.extend(frame.deps);

        // Signature.
        let stage_attr = match entry.stage {
            Stage::Compute {
                workgroup_size: [x, y, z],
            } => format!("@compute @workgroup_size({x}, {y}, {z})"),
            Stage::Vertex => "@vertex".to_string(),
            Stage::Fragment => "@fragment".to_string(),
        };
        let mut rendered_params = Vec::with_capacity(entry.inputs.len());
        for (input, loc) in entry.inputs.iter().zip(&plan.inputs) {
            let attr = io_attr(input.builtin, *loc);
            let ty_text = self.render_type(&input.ty, &mut deps)?;
            rendered_params.push(format!("{attr}{}: {ty_text}", input.name));
        }
        let ret_text = match (&entry.stage, &out_struct) {
            (Stage::Compute { .. }, _) => String::new(),
            (_, Some((out_decl, out_name, _))) => {
                deps.push(*out_decl);
                format!(" -> {out_name}")
            }
            (Stage::Fragment, None) => match entry.outputs.first() {
                Some(output) => {
                    let attr = io_attr(output.builtin, plan.outputs[0]);
                    let ty_text = self.render_type(&output.ty, &mut deps)?;
                    format!(" -> {attr}{ty_text}")
                }
                None => String::new(),
            },
            (Stage::Vertex, None) => String::new(),
        };

        let text = format!(
            "{stage_attr}\nfn {}({}){ret_text} {{\n{}\n}}",
            claimed.name,
            rendered_params.join(", "),
            frame.lines.join("\n"),
        );
        self.arena.finish(decl, text, deps)?;
        self.trail.pop();
        Ok(decl)
    }

    /// Synthesize and render the output interface struct of an entry.
    fn emit_io_struct(
        &mut self,
        entry: &EntryPoint,
        plan: &IoPlan,
        fn_name: &str,
        entry_deps: &mut Vec<DeclId>,
    ) -> ResolveResult<(DeclId, String, weft_types::StructHandle)> {
        let mut schema = StructType::new(format!("{fn_name}_out"));
        for output in &entry.outputs {
            schema = schema.field(&output.name, output.ty.clone());
        }
        let handle = schema.build();

        let claimed = self.ns.claim(
            NameKey::IoStruct(entry.func.identity()),
            &format!("{fn_name}_out"),
        )?;
        let decl = self
            .arena
            .alloc(DeclKind::Struct, claimed.name.clone(), claimed.fresh);
        self.structs
            .insert(handle.identity(), (decl, claimed.name.clone()));

        let mut deps = Vec::new();
        let mut lines = vec![format!("struct {} {{", claimed.name)];
        for (output, loc) in entry.outputs.iter().zip(&plan.outputs) {
            check_identifier(&output.name).map_err(|reason| {
                self.err(ErrorKind::IllegalIdentifier, reason)
                    .with_value(&output.name)
            })?;
            let attr = io_attr(output.builtin, *loc);
            let ty_text = self.render_type(&output.ty, &mut deps)?;
            lines.push(format!("    {attr}{}: {ty_text},", output.name));
        }
        lines.push("}".to_string());
        self.arena.finish(decl, lines.join("\n"), deps)?;

        entry_deps.push(decl);
        Ok((decl, claimed.name, handle))
    }

    fn validate_entry(&self, entry: &EntryPoint) -> ResolveResult<()> {
        match entry.stage {
            Stage::Vertex => {
                let has_position = entry
                    .outputs
                    .iter()
                    .any(|o| o.builtin == Some(BuiltinValue::Position));
                if !has_position {
                    return Err(self
                        .err(
                            ErrorKind::UnsupportedConstruct,
                            "a vertex entry must declare a position builtin output",
                        )
                        .with_note("add .output(IoField::builtin(\"pos\", BuiltinValue::Position, DataType::vec4f()))"));
                }
            }
            Stage::Compute { workgroup_size } => {
                if !entry.outputs.is_empty() {
                    return Err(self.err(
                        ErrorKind::UnsupportedConstruct,
                        "compute entries have no stage outputs",
                    ));
                }
                if workgroup_size.contains(&0) {
                    return Err(self.err(
                        ErrorKind::UnsupportedConstruct,
                        "workgroup size components must be non-zero",
                    ));
                }
            }
            Stage::Fragment => {}
        }
        Ok(())
    }
}

/// `@builtin(...)` or `@location(...)` prefix of an IO field.
fn io_attr(builtin: Option<BuiltinValue>, location: Option<u32>) -> String {
    match (builtin, location) {
        (Some(b), _) => format!("@builtin({}) ", b.wgsl()),
        (None, Some(loc)) => format!("@location({loc}) "),
        (None, None) => String::new(),
    }
}
