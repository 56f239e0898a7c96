//! Console-log serialization subsystem.
//!
//! Opt-in through [`LogConfig`]. Each distinct `log(...)` call site gets a
//! sequential record id (from 1) and a generated wrapper that atomically
//! claims a ring-buffer slot, bounds-checks against the fixed capacity
//! (overflow is a no-op, never corruption), resets the record's byte
//! cursor, and invokes a serializer. Serializers are shared between call
//! sites with identical argument-type sequences; shape-specific encoders
//! are shared between serializers. Record ids are never shared.
//!
//! Encoding is word-packed: integers directly, floats bit-cast to `u32`,
//! booleans as 0/1 words, composites recursively. The host-side shape
//! registry ([`LogCallSite`]) describes each record so the binary I/O
//! layer can decode the buffer.

use serde::{Deserialize, Serialize};

use weft_ast::Expr;
use weft_types::{DataType, Origin, ScalarKind, Snippet};

use crate::error::{ErrorKind, ResolveResult};
use crate::resolve::declarations::{DeclId, DeclKind};
use crate::resolve::namespace::NameKey;
use crate::resolve::specialize::type_key;
use crate::resolve::Run;
use crate::transpile::Transpiler;

/// Ring-buffer configuration for generated logging code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Number of records in the ring buffer.
    pub capacity: u32,
    /// Byte capacity of one record's payload.
    pub record_bytes: u32,
    /// Bind group of the log buffer.
    pub group: u32,
    /// Binding index of the log buffer.
    pub binding: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            record_bytes: 64,
            group: 0,
            binding: 15,
        }
    }
}

/// Host-side description of one log call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogCallSite {
    /// Record id written by the generated wrapper (sequential from 1).
    pub id: u32,
    /// Logged value shapes, in argument order.
    pub args: Vec<String>,
    /// Packed payload size in bytes.
    pub byte_len: u32,
}

/// Per-run log state.
#[derive(Debug, Default)]
pub(crate) struct LogState {
    pub sites: Vec<LogCallSite>,
    pub encoders: indexmap::IndexMap<String, HelperRef>,
    pub serializers: indexmap::IndexMap<String, HelperRef>,
    pub infra: Option<LogInfra>,
}

/// A named generated helper function.
#[derive(Debug, Clone)]
pub(crate) struct HelperRef {
    pub name: String,
    pub decl: DeclId,
}

/// The buffer structs and binding, generated once per run.
#[derive(Debug, Clone)]
pub(crate) struct LogInfra {
    pub buffer_decl: DeclId,
    pub buffer_name: String,
}

/// Packed byte size of a loggable type; `None` if the type cannot be
/// logged (pointers, opaque handles, runtime-sized arrays).
fn encoded_size(ty: &DataType) -> Option<u32> {
    match ty {
        DataType::Scalar(_) => Some(4),
        DataType::Vector { size, .. } => Some(4 * u32::from(*size)),
        DataType::Matrix { cols, rows, .. } => Some(4 * u32::from(*cols) * u32::from(*rows)),
        DataType::Array { elem, len: Some(n) } => Some(n * encoded_size(elem)?),
        DataType::Struct(handle) => {
            let mut total = 0;
            for field in handle.fields() {
                total += encoded_size(&field.ty)?;
            }
            Some(total)
        }
        _ => None,
    }
}

/// Transpile a `log(...)` call.
pub(crate) fn log_call(t: &mut Transpiler, args: &[Expr]) -> ResolveResult<Snippet> {
    let mut snippets = Vec::with_capacity(args.len());
    for arg in args {
        snippets.push(t.expr(arg)?);
    }

    let Some(config) = t.run.opts.log.clone() else {
        t.run.warn_once(
            "log-disabled".to_string(),
            "log() calls are ignored: console logging is not enabled for this resolution"
                .to_string(),
        );
        return Ok(Snippet::new("", DataType::Void, Origin::Local));
    };

    let mut total = 0u32;
    let mut arg_tys = Vec::with_capacity(snippets.len());
    for s in &snippets {
        let ty = s.ty.concretize();
        let Some(bytes) = encoded_size(&ty) else {
            return Err(t
                .run
                .err(
                    ErrorKind::UnsupportedConstruct,
                    format!("cannot log a value of type {}", s.ty),
                )
                .with_value(s.render()));
        };
        total += bytes;
        arg_tys.push(ty);
    }
    if total > config.record_bytes {
        return Err(t
            .run
            .err(
                ErrorKind::CapacityExceeded,
                format!(
                    "log record requires {total} bytes; per-record capacity is {} bytes",
                    config.record_bytes
                ),
            )
            .with_value(format!(
                "log({})",
                snippets
                    .iter()
                    .map(Snippet::render)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
    }

    let infra = ensure_infra(t.run, &config)?;
    let serializer = ensure_serializer(t.run, &arg_tys, &infra)?;

    let id = t.run.log.sites.len() as u32 + 1;
    let wrapper = wrapper_decl(t.run, &config, &infra, &serializer, id, &arg_tys)?;

    t.run.log.sites.push(LogCallSite {
        id,
        args: arg_tys.iter().map(ToString::to_string).collect(),
        byte_len: total,
    });
    t.frame.deps.push(wrapper.decl);

    let rendered: Vec<String> = snippets.iter().map(Snippet::render).collect();
    Ok(Snippet::new(
        format!("{}({})", wrapper.name, rendered.join(", ")),
        DataType::Void,
        Origin::Local,
    ))
}

/// Generate the record struct, buffer struct, and binding once.
fn ensure_infra(run: &mut Run, config: &LogConfig) -> ResolveResult<LogInfra> {
    if let Some(infra) = &run.log.infra {
        return Ok(infra.clone());
    }

    let words = config.record_bytes.div_ceil(4);

    let record = run.ns.claim(NameKey::LogInfra("record"), "LogRecord")?;
    let record_decl = run
        .arena
        .alloc(DeclKind::Struct, record.name.clone(), record.fresh);
    run.arena.finish(
        record_decl,
        format!(
            "struct {} {{\n    id: u32,\n    data: array<u32, {words}>,\n}}",
            record.name
        ),
        Vec::new(),
    )?;

    let buffer = run.ns.claim(NameKey::LogInfra("buffer"), "LogBuffer")?;
    let buffer_struct_decl = run
        .arena
        .alloc(DeclKind::Struct, buffer.name.clone(), buffer.fresh);
    run.arena.finish(
        buffer_struct_decl,
        format!(
            "struct {} {{\n    counter: atomic<u32>,\n    records: array<{}, {}>,\n}}",
            buffer.name, record.name, config.capacity
        ),
        vec![record_decl],
    )?;

    let var = run.ns.claim(NameKey::LogInfra("var"), "log_buffer")?;
    let var_decl = run
        .arena
        .alloc(DeclKind::Global, var.name.clone(), var.fresh);
    run.arena.finish(
        var_decl,
        format!(
            "@group({}) @binding({}) var<storage, read_write> {}: {};",
            config.group, config.binding, var.name, buffer.name
        ),
        vec![buffer_struct_decl],
    )?;

    let infra = LogInfra {
        buffer_decl: var_decl,
        buffer_name: var.name,
    };
    run.log.infra = Some(infra.clone());
    Ok(infra)
}

/// Generate (or reuse) the shape-specific encoder for one type.
fn ensure_encoder(run: &mut Run, ty: &DataType, infra: &LogInfra) -> ResolveResult<HelperRef> {
    let key = type_key(ty);
    if let Some(helper) = run.log.encoders.get(&key) {
        return Ok(helper.clone());
    }

    let mut deps = vec![infra.buffer_decl];
    let buffer = &infra.buffer_name;
    let slot_word = |value: &str| {
        format!("{buffer}.records[slot].data[*cursor] = {value};\n    *cursor = *cursor + 1u;")
    };

    let (flat, body) = match ty {
        DataType::Scalar(kind) => {
            let write = match kind.concretize() {
                ScalarKind::U32 => slot_word("value"),
                ScalarKind::I32 => slot_word("bitcast<u32>(value)"),
                ScalarKind::F32 => slot_word("bitcast<u32>(value)"),
                ScalarKind::F16 => slot_word("bitcast<u32>(f32(value))"),
                ScalarKind::Bool => slot_word("select(0u, 1u, value)"),
                _ => return Err(run.err(ErrorKind::Internal, "abstract kind in log encoder")),
            };
            (kind.wgsl().to_string(), format!("    {write}"))
        }
        DataType::Vector { size, scalar } => {
            let component = ensure_encoder(run, &DataType::Scalar(*scalar), infra)?;
            deps.push(component.decl);
            let lines: Vec<String> = "xyzw"[..*size as usize]
                .chars()
                .map(|c| format!("    {}(slot, cursor, value.{c});", component.name))
                .collect();
            (
                format!("vec{size}{}", scalar.wgsl()),
                lines.join("\n"),
            )
        }
        DataType::Matrix { cols, rows, scalar } => {
            let column = ensure_encoder(run, &DataType::vec(*rows, *scalar), infra)?;
            deps.push(column.decl);
            let lines: Vec<String> = (0..*cols)
                .map(|c| format!("    {}(slot, cursor, value[{c}]);", column.name))
                .collect();
            (
                format!("mat{cols}x{rows}{}", scalar.wgsl()),
                lines.join("\n"),
            )
        }
        DataType::Array { elem, len: Some(n) } => {
            let element = ensure_encoder(run, elem, infra)?;
            deps.push(element.decl);
            let body = format!(
                "    for (var i: u32 = 0u; i < {n}u; i = i + 1u) {{\n        {}(slot, cursor, value[i]);\n    }}",
                element.name
            );
            (format!("array{n}_{}", type_flat(elem)), body)
        }
        DataType::Struct(handle) => {
            let (struct_decl, struct_name) = run.ensure_struct(handle)?;
            deps.push(struct_decl);
            let mut lines = Vec::with_capacity(handle.fields().len());
            for field in handle.fields() {
                let encoder = ensure_encoder(run, &field.ty, infra)?;
                deps.push(encoder.decl);
                lines.push(format!(
                    "    {}(slot, cursor, value.{});",
                    encoder.name, field.name
                ));
            }
            (struct_name, lines.join("\n"))
        }
        other => {
            return Err(run.err(
                ErrorKind::Internal,
                format!("unencodable type reached the log encoder: {other}"),
            ))
        }
    };

    let claimed = run
        .ns
        .claim(NameKey::LogHelper(key.clone()), &format!("log_write_{flat}"))?;
    let decl = run
        .arena
        .alloc(DeclKind::Function, claimed.name.clone(), claimed.fresh);
    let mut ty_deps = Vec::new();
    let ty_text = run.render_type(ty, &mut ty_deps)?;
    deps.extend(ty_deps);
    run.arena.finish(
        decl,
        format!(
            "fn {}(slot: u32, cursor: ptr<function, u32>, value: {ty_text}) {{\n{body}\n}}",
            claimed.name
        ),
        deps,
    )?;

    let helper = HelperRef {
        name: claimed.name,
        decl,
    };
    run.log.encoders.insert(key, helper.clone());
    Ok(helper)
}

/// Generate (or reuse) the serializer for one argument-type sequence.
fn ensure_serializer(
    run: &mut Run,
    arg_tys: &[DataType],
    infra: &LogInfra,
) -> ResolveResult<HelperRef> {
    let key = arg_tys.iter().map(type_key).collect::<Vec<_>>().join(",");
    if let Some(helper) = run.log.serializers.get(&key) {
        return Ok(helper.clone());
    }

    let mut deps = Vec::new();
    let mut body = Vec::with_capacity(arg_tys.len());
    let mut params = vec!["slot: u32".to_string(), "cursor: ptr<function, u32>".to_string()];
    for (i, ty) in arg_tys.iter().enumerate() {
        let encoder = ensure_encoder(run, ty, infra)?;
        deps.push(encoder.decl);
        let ty_text = run.render_type(ty, &mut deps)?;
        params.push(format!("arg{i}: {ty_text}"));
        body.push(format!("    {}(slot, cursor, arg{i});", encoder.name));
    }

    let claimed = run
        .ns
        .claim(NameKey::LogHelper(format!("serialize:{key}")), "log_serialize")?;
    let decl = run
        .arena
        .alloc(DeclKind::Function, claimed.name.clone(), claimed.fresh);
    run.arena.finish(
        decl,
        format!(
            "fn {}({}) {{\n{}\n}}",
            claimed.name,
            params.join(", "),
            body.join("\n")
        ),
        deps,
    )?;

    let helper = HelperRef {
        name: claimed.name,
        decl,
    };
    run.log.serializers.insert(key, helper.clone());
    Ok(helper)
}

/// Generate the per-call-site wrapper that claims a slot and serializes.
fn wrapper_decl(
    run: &mut Run,
    config: &LogConfig,
    infra: &LogInfra,
    serializer: &HelperRef,
    id: u32,
    arg_tys: &[DataType],
) -> ResolveResult<HelperRef> {
    let claimed = run.ns.claim(NameKey::LogSite(id), &format!("log_{id}"))?;
    let decl = run
        .arena
        .alloc(DeclKind::Function, claimed.name.clone(), claimed.fresh);

    let mut deps = vec![infra.buffer_decl, serializer.decl];
    let mut params = Vec::with_capacity(arg_tys.len());
    let mut forwarded = vec!["slot".to_string(), "&cursor".to_string()];
    for (i, ty) in arg_tys.iter().enumerate() {
        let ty_text = run.render_type(ty, &mut deps)?;
        params.push(format!("arg{i}: {ty_text}"));
        forwarded.push(format!("arg{i}"));
    }

    let buffer = &infra.buffer_name;
    let text = format!(
        "fn {name}({params}) {{\n    let slot = atomicAdd(&{buffer}.counter, 1u);\n    if (slot >= {capacity}u) {{\n        return;\n    }}\n    {buffer}.records[slot].id = {id}u;\n    var cursor: u32 = 0u;\n    {serializer}({forwarded});\n}}",
        name = claimed.name,
        params = params.join(", "),
        capacity = config.capacity,
        serializer = serializer.name,
        forwarded = forwarded.join(", "),
    );
    run.arena.finish(decl, text, deps)?;

    Ok(HelperRef {
        name: claimed.name,
        decl,
    })
}

/// Short flat spelling of a type for generated helper names.
fn type_flat(ty: &DataType) -> String {
    match ty {
        DataType::Scalar(k) => k.wgsl().to_string(),
        DataType::Vector { size, scalar } => format!("vec{size}{}", scalar.wgsl()),
        DataType::Matrix { cols, rows, scalar } => format!("mat{cols}x{rows}{}", scalar.wgsl()),
        DataType::Array { elem, len: Some(n) } => format!("array{n}_{}", type_flat(elem)),
        DataType::Struct(handle) => handle.name().to_string(),
        other => format!("{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::StructType;

    #[test]
    fn test_encoded_sizes() {
        assert_eq!(encoded_size(&DataType::f32()), Some(4));
        assert_eq!(encoded_size(&DataType::vec3f()), Some(12));
        assert_eq!(encoded_size(&DataType::mat(4, 4)), Some(64));
        assert_eq!(
            encoded_size(&DataType::array(DataType::vec2f(), 3)),
            Some(24)
        );

        let st = StructType::new("P")
            .field("pos", DataType::vec3f())
            .field("mass", DataType::f32())
            .build();
        assert_eq!(encoded_size(&st.ty()), Some(16));

        assert_eq!(encoded_size(&DataType::runtime_array(DataType::f32())), None);
        assert_eq!(encoded_size(&DataType::Sampler), None);
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.record_bytes, 64);
    }
}
