//! Console-log subsystem tests: generated ring-buffer plumbing, encoder
//! sharing, capacity enforcement, and the degraded path when logging is
//! disabled.

use weft::{
    resolve, BuiltinValue, EntryPoint, ErrorKind, External, FnHandle, IoField, LogConfig,
    Namespace, ResolutionContext, ResolveOptions, ShaderFn,
};
use weft_ast::{Block, Expr, FnDef, Param, Stmt};
use weft_types::{DataType, StructType};

fn gid_entry(func: FnHandle) -> EntryPoint {
    EntryPoint::compute(func, [64, 1, 1]).input(IoField::builtin(
        "gid",
        BuiltinValue::GlobalInvocationId,
        DataType::vec3u(),
    ))
}

fn with_log(config: LogConfig, entry: EntryPoint) -> weft::ResolveResult<weft::Resolved> {
    let ctx = ResolutionContext::new(ResolveOptions {
        log: Some(config),
        ..Default::default()
    });
    let mut ns = Namespace::new();
    ctx.resolve(&mut ns, &[entry])
}

#[test]
fn log_calls_generate_ring_buffer_plumbing() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![Param::auto("gid")],
        Block::new([
            Stmt::var("x", Expr::float(1.5)),
            Stmt::Expr(Expr::call(
                "log",
                [Expr::ident("x"), Expr::member(Expr::ident("gid"), "x")],
            )),
        ]),
    ))
    .build();

    let out = with_log(LogConfig::default(), gid_entry(main)).unwrap();
    let wgsl = &out.wgsl;

    assert!(wgsl.contains("struct LogRecord {"));
    assert!(wgsl.contains("data: array<u32, 16>,"));
    assert!(wgsl.contains("struct LogBuffer {"));
    assert!(wgsl.contains("counter: atomic<u32>,"));
    assert!(wgsl.contains(
        "@group(0) @binding(15) var<storage, read_write> log_buffer: LogBuffer;"
    ));
    // the wrapper claims a slot atomically and bails out on overflow
    assert!(wgsl.contains("let slot = atomicAdd(&log_buffer.counter, 1u);"));
    assert!(wgsl.contains("if (slot >= 64u) {"));
    assert!(wgsl.contains("log_buffer.records[slot].id = 1u;"));
    assert!(wgsl.contains("var cursor: u32 = 0u;"));
    // floats bit-cast, unsigned integers write directly
    assert!(wgsl.contains("bitcast<u32>(value)"));
    assert!(wgsl.contains("log_1(x, gid.x);"));

    assert_eq!(out.log_sites.len(), 1);
    assert_eq!(out.log_sites[0].id, 1);
    assert_eq!(out.log_sites[0].args, vec!["f32", "u32"]);
    assert_eq!(out.log_sites[0].byte_len, 8);
}

#[test]
fn identical_shapes_share_serializers_but_not_record_ids() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("a", Expr::float(1.0)),
            Stmt::Expr(Expr::call("log", [Expr::ident("a")])),
            Stmt::Expr(Expr::call("log", [Expr::ident("a")])),
        ]),
    ))
    .build();

    let out = with_log(LogConfig::default(), EntryPoint::compute(main, [1, 1, 1])).unwrap();
    let wgsl = &out.wgsl;

    // two wrappers with distinct record ids
    assert!(wgsl.contains("fn log_1(arg0: f32)"));
    assert!(wgsl.contains("fn log_2(arg0: f32)"));
    assert!(wgsl.contains("records[slot].id = 1u;"));
    assert!(wgsl.contains("records[slot].id = 2u;"));
    // one shared serializer and one shared f32 encoder
    assert_eq!(wgsl.matches("fn log_serialize(").count(), 1);
    assert_eq!(wgsl.matches("fn log_write_f32(").count(), 1);

    assert_eq!(out.log_sites.len(), 2);
    assert_eq!(out.log_sites[0].id, 1);
    assert_eq!(out.log_sites[1].id, 2);
}

#[test]
fn composite_values_reuse_shape_encoders() {
    let particle = StructType::new("Particle")
        .field("pos", DataType::vec3f())
        .field("mass", DataType::f32())
        .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var(
                "p",
                Expr::call(
                    "Particle",
                    [
                        Expr::call(
                            "vec3f",
                            [Expr::float(1.0), Expr::float(2.0), Expr::float(3.0)],
                        ),
                        Expr::float(4.0),
                    ],
                ),
            ),
            Stmt::Expr(Expr::call("log", [Expr::ident("p")])),
        ]),
    ))
    .with("Particle", External::Struct(particle))
    .build();

    let out = with_log(LogConfig::default(), EntryPoint::compute(main, [1, 1, 1])).unwrap();
    let wgsl = &out.wgsl;

    // struct encoder walks fields through the vec3 and f32 encoders
    assert!(wgsl.contains("fn log_write_Particle(slot: u32, cursor: ptr<function, u32>, value: Particle)"));
    assert!(wgsl.contains("log_write_vec3f32(slot, cursor, value.pos);"));
    assert!(wgsl.contains("log_write_f32(slot, cursor, value.mass);"));
    assert_eq!(wgsl.matches("fn log_write_f32(").count(), 1);
    assert_eq!(out.log_sites[0].byte_len, 16);
}

#[test]
fn payload_at_capacity_succeeds_and_one_over_raises() {
    let at_limit = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var(
                "v",
                Expr::call(
                    "vec3f",
                    [Expr::float(1.0), Expr::float(2.0), Expr::float(3.0)],
                ),
            ),
            Stmt::Expr(Expr::call("log", [Expr::ident("v")])),
        ]),
    ))
    .build();
    let config = LogConfig {
        record_bytes: 12,
        ..Default::default()
    };
    assert!(with_log(config, EntryPoint::compute(at_limit, [1, 1, 1])).is_ok());

    let over = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var(
                "v",
                Expr::call(
                    "vec3f",
                    [Expr::float(1.0), Expr::float(2.0), Expr::float(3.0)],
                ),
            ),
            Stmt::Expr(Expr::call("log", [Expr::ident("v")])),
        ]),
    ))
    .build();
    let tight = LogConfig {
        record_bytes: 11,
        ..Default::default()
    };
    let err = with_log(tight, EntryPoint::compute(over, [1, 1, 1])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CapacityExceeded);
    assert!(err.message.contains("12 bytes"), "message: {}", err.message);
    assert!(err.message.contains("11 bytes"));
}

#[test]
fn disabled_logging_degrades_to_a_noop_with_a_warning() {
    // Capture the one-time warning instead of printing it.
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();

    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("x", Expr::float(1.0)),
            Stmt::Expr(Expr::call("log", [Expr::ident("x")])),
        ]),
    ))
    .build();

    let out = resolve(&[EntryPoint::compute(main, [1, 1, 1])]).unwrap();
    assert!(!out.wgsl.contains("log_"));
    assert!(!out.wgsl.contains("atomicAdd"));
    assert!(out.log_sites.is_empty());
}

#[test]
fn unloggable_values_are_rejected() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("x", Expr::float(1.0)),
            Stmt::let_("r", Expr::ref_to("x")),
            Stmt::Expr(Expr::call("log", [Expr::ident("r")])),
        ]),
    ))
    .build();

    let err = with_log(
        LogConfig::default(),
        EntryPoint::compute(main, [1, 1, 1]),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConstruct);
    assert!(err.message.contains("ptr"));
}

#[test]
fn log_shape_registry_serializes_for_host_decoding() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("x", Expr::float(1.0)),
            Stmt::Expr(Expr::call("log", [Expr::ident("x")])),
        ]),
    ))
    .build();

    let out = with_log(LogConfig::default(), EntryPoint::compute(main, [1, 1, 1])).unwrap();
    let json = serde_json::to_string(&out.log_sites).unwrap();
    assert!(json.contains("\"id\":1"));
    assert!(json.contains("\"byte_len\":4"));
    assert!(json.contains("f32"));
}
