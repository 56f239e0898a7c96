//! End-to-end resolution tests: determinism, specialization, naming,
//! mutation rules, ternary restriction, stage pairing, and namespace
//! sharing across sequential resolutions.

use weft::{
    resolve, BuiltinValue, EntryPoint, ErrorKind, External, FnHandle, GlobalVar, IoField,
    Namespace, ResolutionContext, ResolveOptions, ShaderFn, Slot,
};
use weft_ast::{Block, Expr, FnDef, Param, Stmt};
use weft_types::{AccessMode, BinaryOp, ConstValue, DataType, StructType};

fn compute_entry(func: FnHandle) -> EntryPoint {
    EntryPoint::compute(func, [64, 1, 1])
}

fn gid_entry(func: FnHandle) -> EntryPoint {
    compute_entry(func).input(IoField::builtin(
        "gid",
        BuiltinValue::GlobalInvocationId,
        DataType::vec3u(),
    ))
}

#[test]
fn resolving_twice_is_byte_identical() {
    let build = || {
        let data = GlobalVar::storage(
            "data",
            DataType::runtime_array(DataType::f32()),
            0,
            0,
            AccessMode::ReadWrite,
        )
        .build();
        let scale = ShaderFn::new(FnDef::new(
            "scale",
            vec![Param::auto("x")],
            Block::new([Stmt::ret(Expr::mul(Expr::ident("x"), Expr::float(2.0)))]),
        ))
        .build();
        let main = ShaderFn::new(FnDef::new(
            "main",
            vec![Param::auto("gid")],
            Block::new([Stmt::assign(
                Expr::index(Expr::ident("data"), Expr::member(Expr::ident("gid"), "x")),
                Expr::call(
                    "scale",
                    [Expr::index(
                        Expr::ident("data"),
                        Expr::member(Expr::ident("gid"), "x"),
                    )],
                ),
            )]),
        ))
        .with("data", External::Global(data))
        .with("scale", External::Fn(scale))
        .build();
        gid_entry(main)
    };

    let first = resolve(&[build()]).unwrap();
    let second = resolve(&[build()]).unwrap();
    assert_eq!(first.wgsl, second.wgsl);
    assert!(first.wgsl.contains("fn scale(x: f32) -> f32"));
    assert!(first.wgsl.contains("@group(0) @binding(0) var<storage, read_write> data: array<f32>;"));
}

#[test]
fn generic_function_specializes_per_type_and_dedupes() {
    let add = ShaderFn::new(FnDef::new(
        "add",
        vec![Param::auto("x"), Param::auto("y")],
        Block::new([Stmt::ret(Expr::add(Expr::ident("x"), Expr::ident("y")))]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("a", Expr::call("add", [Expr::float(1.0), Expr::float(2.0)])),
            Stmt::var("b", Expr::call("add", [Expr::float(3.0), Expr::float(4.0)])),
            Stmt::var("c", Expr::call("add", [Expr::int(1), Expr::int(2)])),
        ]),
    ))
    .with("add", External::Fn(add))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert_eq!(out.wgsl.matches("fn add(").count(), 1);
    assert_eq!(out.wgsl.matches("fn add_1(").count(), 1);
    assert!(out.wgsl.contains("fn add(x: f32, y: f32) -> f32"));
    assert!(out.wgsl.contains("fn add_1(x: i32, y: i32) -> i32"));
}

#[test]
fn dot2_vec2_and_vec3_take_suffixed_names() {
    let dot2 = ShaderFn::new(FnDef::new(
        "dot2",
        vec![Param::auto("a")],
        Block::new([Stmt::ret(Expr::call(
            "dot",
            [Expr::ident("a"), Expr::ident("a")],
        ))]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var(
                "p",
                Expr::call(
                    "dot2",
                    [Expr::call("vec2f", [Expr::float(1.0), Expr::float(2.0)])],
                ),
            ),
            Stmt::var(
                "q",
                Expr::call(
                    "dot2",
                    [Expr::call(
                        "vec3f",
                        [Expr::float(1.0), Expr::float(2.0), Expr::float(3.0)],
                    )],
                ),
            ),
        ]),
    ))
    .with("dot2", External::Fn(dot2))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out.wgsl.contains("fn dot2(a: vec2<f32>) -> f32"));
    assert!(out.wgsl.contains("fn dot2_1(a: vec3<f32>) -> f32"));
}

#[test]
fn unused_parameters_are_elided_from_signature_and_call() {
    let pick = ShaderFn::new(FnDef::new(
        "pick",
        vec![Param::auto("used"), Param::auto("ignored")],
        Block::new([Stmt::ret(Expr::ident("used"))]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var(
            "v",
            Expr::call("pick", [Expr::float(1.0), Expr::float(9.0)]),
        )]),
    ))
    .with("pick", External::Fn(pick))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out.wgsl.contains("fn pick(used: f32) -> f32"));
    assert!(out.wgsl.contains("pick(1.0)"));
    assert!(!out.wgsl.contains("ignored"));
}

#[test]
fn mutating_a_parameter_is_rejected() {
    let bad = ShaderFn::new(FnDef::new(
        "bad",
        vec![Param::auto("x")],
        Block::new([
            Stmt::assign(Expr::ident("x"), Expr::float(1.0)),
            Stmt::ret(Expr::ident("x")),
        ]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var("v", Expr::call("bad", [Expr::float(1.0)]))]),
    ))
    .with("bad", External::Fn(bad))
    .build();

    let err = resolve(&[compute_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMutation);
    assert!(err.message.contains("parameter"));
    assert!(err.notes.iter().any(|n| n.contains("var")));
    // breadcrumbs lead from the root through the specialization
    let trail = err.trail.join(" → ");
    assert!(trail.starts_with("<root>"), "trail was: {trail}");
    assert!(trail.contains("fn:main"));
    assert!(trail.contains("fn*:bad(f32)"));
}

#[test]
fn returning_a_reference_is_rejected() {
    let bad = ShaderFn::new(FnDef::new(
        "bad",
        vec![],
        Block::new([
            Stmt::var("v", Expr::float(1.0)),
            Stmt::let_("r", Expr::ref_to("v")),
            Stmt::ret(Expr::ident("r")),
        ]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::Expr(Expr::call("bad", []))]),
    ))
    .with("bad", External::Fn(bad))
    .build();

    let err = resolve(&[compute_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMutation);
    assert!(err.message.contains("returned"));
}

#[test]
fn reassigning_a_reference_over_a_variable_is_rejected() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("a", Expr::float(1.0)),
            Stmt::var("b", Expr::float(2.0)),
            Stmt::assign(Expr::ident("a"), Expr::ref_to("b")),
        ]),
    ))
    .build();

    let err = resolve(&[compute_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMutation);
    assert!(err.message.contains("reference"));
}

#[test]
fn reference_to_a_parameter_is_rejected() {
    let bad = ShaderFn::new(FnDef::new(
        "bad",
        vec![Param::auto("x")],
        Block::new([
            Stmt::let_("r", Expr::ref_to("x")),
            Stmt::ret(Expr::ident("x")),
        ]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var("v", Expr::call("bad", [Expr::float(1.0)]))]),
    ))
    .with("bad", External::Fn(bad))
    .build();

    let err = resolve(&[compute_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalMutation);
    assert!(err.message.contains("reference"));
}

#[test]
fn reference_parameters_lower_to_pointers() {
    let bump = ShaderFn::new(FnDef::new(
        "bump",
        vec![Param::reference("target")],
        Block::new([Stmt::assign_op(
            Expr::deref(Expr::ident("target")),
            BinaryOp::Add,
            Expr::int(1),
        )]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("count", Expr::int(0)),
            Stmt::Expr(Expr::call("bump", [Expr::ref_to("count")])),
        ]),
    ))
    .with("bump", External::Fn(bump))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out.wgsl.contains("fn bump(target: ptr<function, i32>)"));
    assert!(out.wgsl.contains("bump((&count))"));
    assert!(out.wgsl.contains("(*target) += 1"));
}

#[test]
fn comptime_ternary_resolves_to_one_branch() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("hot", Expr::float(1.0)),
            Stmt::var("cold", Expr::float(2.0)),
            Stmt::var(
                "chosen",
                Expr::ternary(
                    Expr::lt(Expr::int(1), Expr::int(2)),
                    Expr::ident("hot"),
                    Expr::ident("cold"),
                ),
            ),
        ]),
    ))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out.wgsl.contains("var chosen = hot;"));
    assert!(!out.wgsl.contains("chosen = cold"));
}

#[test]
fn runtime_ternary_condition_is_rejected_with_guidance() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![Param::auto("gid")],
        Block::new([
            Stmt::var("x", Expr::float(1.0)),
            Stmt::var(
                "y",
                Expr::ternary(
                    Expr::lt(
                        Expr::member(Expr::ident("gid"), "x"),
                        Expr::int(4),
                    ),
                    Expr::ident("x"),
                    Expr::float(0.0),
                ),
            ),
        ]),
    ))
    .build();

    let err = resolve(&[gid_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConstruct);
    assert!(err.notes.iter().any(|n| n.contains("select")));
}

#[test]
fn struct_shared_across_sequential_resolutions_is_declared_once() {
    let particle = StructType::new("Particle")
        .field("pos", DataType::vec3f())
        .field("mass", DataType::f32())
        .build();

    let make_entry = |fn_name: &str| {
        let func = ShaderFn::new(FnDef::new(
            fn_name,
            vec![],
            Block::new([Stmt::var(
                "p",
                Expr::call(
                    "Particle",
                    [
                        Expr::call(
                            "vec3f",
                            [Expr::float(0.0), Expr::float(0.0), Expr::float(0.0)],
                        ),
                        Expr::float(1.0),
                    ],
                ),
            )]),
        ))
        .with("Particle", External::Struct(particle.clone()))
        .build();
        compute_entry(func)
    };

    let ctx = ResolutionContext::new(ResolveOptions::default());
    let mut ns = Namespace::new();
    let first = ctx.resolve(&mut ns, &[make_entry("main_a")]).unwrap();
    let second = ctx.resolve(&mut ns, &[make_entry("main_b")]).unwrap();

    assert!(first.wgsl.contains("struct Particle {"));
    assert!(first.wgsl.contains("Particle(vec3<f32>(0.0, 0.0, 0.0), 1.0)"));
    assert!(!second.wgsl.contains("struct Particle {"));
    assert!(second.wgsl.contains("Particle(vec3<f32>(0.0, 0.0, 0.0), 1.0)"));
}

#[test]
fn explicit_layout_overrides_render_in_order() {
    let aligned = StructType::new("Params")
        .field_layout("origin", DataType::vec3f(), Some(16), Some(16))
        .field("scale", DataType::f32())
        .build();
    let params = GlobalVar::uniform("params", aligned.ty(), 0, 1).build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var(
            "s",
            Expr::member(Expr::ident("params"), "scale"),
        )]),
    ))
    .with("params", External::Global(params))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out
        .wgsl
        .contains("@align(16) @size(16) origin: vec3<f32>,"));
    assert!(out.wgsl.contains("var<uniform> params: Params;"));
}

#[test]
fn declarations_emit_in_group_order() {
    let particle = StructType::new("Particle")
        .field("pos", DataType::vec3f())
        .build();
    let data = GlobalVar::storage(
        "particles",
        DataType::runtime_array(particle.ty()),
        0,
        0,
        AccessMode::ReadWrite,
    )
    .build();
    let helper = ShaderFn::new(FnDef::new(
        "first_pos",
        vec![],
        Block::new([Stmt::ret(Expr::member(
            Expr::index(Expr::ident("particles"), Expr::int(0)),
            "pos",
        ))]),
    ))
    .with("particles", External::Global(data.clone()))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var("p", Expr::call("first_pos", []))]),
    ))
    .with("first_pos", External::Fn(helper))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    let struct_at = out.wgsl.find("struct Particle").unwrap();
    let global_at = out.wgsl.find("var<storage").unwrap();
    let fn_at = out.wgsl.find("fn first_pos").unwrap();
    let entry_at = out.wgsl.find("@compute").unwrap();
    assert!(struct_at < global_at);
    assert!(global_at < fn_at);
    assert!(fn_at < entry_at);
}

#[test]
fn vertex_fragment_pair_matches_locations_positionally() {
    let vert = ShaderFn::new(FnDef::new(
        "vs",
        vec![Param::auto("position")],
        Block::new([Stmt::ret(Expr::call(
            "Out",
            [
                Expr::call(
                    "vec4f",
                    [
                        Expr::ident("position"),
                        Expr::float(0.0),
                        Expr::float(1.0),
                    ],
                ),
                Expr::ident("position"),
            ],
        ))]),
    ))
    .build();
    let frag = ShaderFn::new(FnDef::new(
        "fs",
        vec![Param::auto("uv")],
        Block::new([Stmt::ret(Expr::call(
            "vec4f",
            [Expr::ident("uv"), Expr::float(0.0), Expr::float(1.0)],
        ))]),
    ))
    .build();

    let vertex = EntryPoint::vertex(vert)
        .input(IoField::at("in_pos", DataType::vec2f(), 0))
        .output(IoField::builtin(
            "clip",
            BuiltinValue::Position,
            DataType::vec4f(),
        ))
        .output(IoField::at("uv", DataType::vec2f(), 3));
    let fragment = EntryPoint::fragment(frag)
        .input(IoField::new("uv", DataType::vec2f()))
        .output(IoField::new("color", DataType::vec4f()));

    let out = resolve(&[vertex, fragment]).unwrap();
    assert!(out.wgsl.contains("struct vs_out {"));
    assert!(out.wgsl.contains("@builtin(position) clip: vec4<f32>,"));
    assert!(out.wgsl.contains("@location(3) uv: vec2<f32>,"));
    // The fragment input follows the producer's explicit location.
    assert!(out.wgsl.contains("fn fs(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32>"));
    assert!(out.wgsl.contains("@vertex"));
    assert!(out.wgsl.contains("@fragment"));
}

#[test]
fn slot_overrides_enter_the_specialization_key() {
    let radius = Slot::with_default("radius", ConstValue::F32(2.0)).build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            Stmt::var("r", Expr::float(0.0)),
            Stmt::assign(Expr::ident("r"), Expr::ident("radius")),
        ]),
    ))
    .with("radius", External::Slot(radius.clone()))
    .build();

    let defaulted = resolve(&[compute_entry(main.clone())]).unwrap();
    assert!(defaulted.wgsl.contains("r = 2.0f"));

    let ctx = ResolutionContext::new(ResolveOptions {
        overrides: vec![(radius, ConstValue::F32(5.0))],
        ..Default::default()
    });
    let mut ns = Namespace::new();
    let overridden = ctx.resolve(&mut ns, &[compute_entry(main)]).unwrap();
    assert!(overridden.wgsl.contains("r = 5.0f"));
}

#[test]
fn mixed_kind_assignment_inserts_conversion() {
    let counts = GlobalVar::storage(
        "counts",
        DataType::runtime_array(DataType::i32()),
        0,
        0,
        AccessMode::Read,
    )
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![Param::auto("gid")],
        Block::new([
            Stmt::var("total", Expr::float(0.0)),
            Stmt::assign(
                Expr::ident("total"),
                Expr::index(Expr::ident("counts"), Expr::member(Expr::ident("gid"), "x")),
            ),
        ]),
    ))
    .with("counts", External::Global(counts))
    .build();

    let out = resolve(&[gid_entry(main)]).unwrap();
    assert!(out.wgsl.contains("total = f32(counts[gid.x]);"));
}

#[test]
fn disagreeing_returns_list_every_type() {
    let bad = ShaderFn::new(FnDef::new(
        "bad",
        vec![Param::typed("flag", DataType::bool())],
        Block::new([
            Stmt::if_(
                Expr::ident("flag"),
                Block::new([Stmt::ret(Expr::float(1.0))]),
            ),
            Stmt::ret(Expr::int(1)),
        ]),
    ))
    .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([Stmt::var("v", Expr::call("bad", [Expr::bool_lit(true)]))]),
    ))
    .with("bad", External::Fn(bad))
    .build();

    let err = resolve(&[compute_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeUnification);
    assert!(err.message.contains("f32"));
    assert!(err.message.contains("i32"));
}

#[test]
fn local_shadowing_renames_the_global_not_the_local() {
    let threshold = GlobalVar::private_init("threshold", DataType::f32(), ConstValue::F32(0.5))
        .build();
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![],
        Block::new([
            // The local takes the name before the global is ever touched.
            Stmt::var("threshold", Expr::float(1.0)),
            Stmt::var("fromglobal", Expr::ident("cutoff")),
        ]),
    ))
    .with("cutoff", External::Global(threshold))
    .build();

    let out = resolve(&[compute_entry(main)]).unwrap();
    assert!(out.wgsl.contains("var threshold = 1.0;"));
    // The global moved aside; the local kept its name.
    assert!(out.wgsl.contains("var<private> threshold_1: f32 = 0.5f;"));
    assert!(out.wgsl.contains("var fromglobal = threshold_1;"));
}

#[test]
fn unknown_member_names_identifier_and_value() {
    let main = ShaderFn::new(FnDef::new(
        "main",
        vec![Param::auto("gid")],
        Block::new([Stmt::var(
            "v",
            Expr::member(Expr::ident("gid"), "w"),
        )]),
    ))
    .build();

    let err = resolve(&[gid_entry(main)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeUnification);
    assert!(err.message.contains("'w'"));
    assert!(err.message.contains("gid"));
}
