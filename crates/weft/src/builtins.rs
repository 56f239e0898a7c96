//! Builtin math/texture function registry.
//!
//! A closed table mapping builtin names to arity and a result-type rule.
//! All type checking for builtin calls happens here; the transpiler only
//! renders the call text once a rule accepts the argument types.
//!
//! Unlike user functions, builtins are never specialized or emitted: they
//! exist in the target language already.

use weft_types::{scalar, DataType, ScalarKind};

/// Argument-count constraint for a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Fixed(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
        }
    }
}

/// A registered builtin: name, arity, and result-type rule.
pub(crate) struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub result: fn(&[DataType]) -> Result<DataType, String>,
}

/// The builtin table. Lookup is linear; the set is small and closed.
static BUILTINS: &[Builtin] = &[
    Builtin { name: "abs", arity: Arity::Fixed(1), result: numeric_unary },
    Builtin { name: "floor", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "ceil", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "fract", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "sqrt", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "sin", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "cos", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "tan", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "exp", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "log", arity: Arity::Fixed(1), result: float_unary },
    Builtin { name: "normalize", arity: Arity::Fixed(1), result: float_vec_unary },
    Builtin { name: "length", arity: Arity::Fixed(1), result: length_rule },
    Builtin { name: "distance", arity: Arity::Fixed(2), result: distance_rule },
    Builtin { name: "dot", arity: Arity::Fixed(2), result: dot_rule },
    Builtin { name: "cross", arity: Arity::Fixed(2), result: cross_rule },
    Builtin { name: "min", arity: Arity::Fixed(2), result: numeric_pair },
    Builtin { name: "max", arity: Arity::Fixed(2), result: numeric_pair },
    Builtin { name: "pow", arity: Arity::Fixed(2), result: float_pair },
    Builtin { name: "atan2", arity: Arity::Fixed(2), result: float_pair },
    Builtin { name: "clamp", arity: Arity::Fixed(3), result: numeric_triple },
    Builtin { name: "mix", arity: Arity::Fixed(3), result: mix_rule },
    Builtin { name: "select", arity: Arity::Fixed(3), result: select_rule },
    Builtin { name: "arrayLength", arity: Arity::Fixed(1), result: array_length_rule },
    Builtin { name: "textureSample", arity: Arity::Fixed(3), result: texture_sample_rule },
    Builtin { name: "textureLoad", arity: Arity::Fixed(3), result: texture_load_rule },
];

/// Look up a builtin by name, checking arity.
pub(crate) fn lookup(name: &str, arg_count: usize) -> Option<Result<&'static Builtin, String>> {
    let builtin = BUILTINS.iter().find(|b| b.name == name)?;
    if !builtin.arity.accepts(arg_count) {
        let Arity::Fixed(expected) = builtin.arity;
        return Some(Err(format!(
            "'{name}' expects {expected} argument(s), got {arg_count}"
        )));
    }
    Some(Ok(builtin))
}

/// Vector constructor result type, for callees like `vec3f`.
///
/// Accepts a single scalar (splat) or any mix of scalars/vectors whose
/// components sum to the target size, with kinds unifying to the target.
pub(crate) fn constructor(name: &str, args: &[DataType]) -> Option<Result<DataType, String>> {
    let (size, kind) = match name {
        "vec2f" => (2, ScalarKind::F32),
        "vec3f" => (3, ScalarKind::F32),
        "vec4f" => (4, ScalarKind::F32),
        "vec2i" => (2, ScalarKind::I32),
        "vec3i" => (3, ScalarKind::I32),
        "vec4i" => (4, ScalarKind::I32),
        "vec2u" => (2, ScalarKind::U32),
        "vec3u" => (3, ScalarKind::U32),
        "vec4u" => (4, ScalarKind::U32),
        _ => return None,
    };
    Some(constructor_check(name, size, kind, args))
}

fn constructor_check(
    name: &str,
    size: u8,
    kind: ScalarKind,
    args: &[DataType],
) -> Result<DataType, String> {
    if args.is_empty() {
        return Err(format!("'{name}' requires at least one argument"));
    }
    let mut components = 0u8;
    for arg in args {
        let n = arg
            .component_count()
            .ok_or_else(|| format!("'{name}' cannot take an argument of type {arg}"))?;
        let arg_kind = arg.scalar_kind().unwrap_or(ScalarKind::Bool);
        let unified = scalar::unify(arg_kind, kind)
            .ok_or_else(|| format!("'{name}' cannot take a {arg_kind} component"))?;
        if unified.kind != kind {
            return Err(format!("'{name}' cannot take a {arg_kind} component"));
        }
        components += n;
    }
    let splat = args.len() == 1 && components == 1;
    if !splat && components != size {
        return Err(format!(
            "'{name}' needs {size} components, got {components}"
        ));
    }
    Ok(DataType::vec(size, kind))
}

/// Canonical WGSL spelling for a constructor callee.
pub(crate) fn constructor_spelling(name: &str) -> Option<&'static str> {
    Some(match name {
        "vec2f" => "vec2<f32>",
        "vec3f" => "vec3<f32>",
        "vec4f" => "vec4<f32>",
        "vec2i" => "vec2<i32>",
        "vec3i" => "vec3<i32>",
        "vec4i" => "vec4<i32>",
        "vec2u" => "vec2<u32>",
        "vec3u" => "vec3<u32>",
        "vec4u" => "vec4<u32>",
        _ => return None,
    })
}

fn numeric_unary(args: &[DataType]) -> Result<DataType, String> {
    let ty = &args[0];
    if ty.is_numeric() {
        Ok(ty.concretize())
    } else {
        Err(format!("expected a numeric scalar or vector, got {ty}"))
    }
}

fn float_unary(args: &[DataType]) -> Result<DataType, String> {
    let ty = args[0].concretize();
    match ty.scalar_kind() {
        Some(k) if k.is_float() && !matches!(ty, DataType::Matrix { .. }) => Ok(ty),
        _ => Err(format!("expected a floating scalar or vector, got {}", args[0])),
    }
}

fn float_vec_unary(args: &[DataType]) -> Result<DataType, String> {
    let ty = args[0].concretize();
    match &ty {
        DataType::Vector { scalar, .. } if scalar.is_float() => Ok(ty),
        _ => Err(format!("expected a floating vector, got {}", args[0])),
    }
}

fn length_rule(args: &[DataType]) -> Result<DataType, String> {
    let ty = args[0].concretize();
    match ty.scalar_kind() {
        Some(k) if k.is_float() && !matches!(ty, DataType::Matrix { .. }) => {
            Ok(DataType::Scalar(k))
        }
        _ => Err(format!("expected a floating scalar or vector, got {}", args[0])),
    }
}

fn distance_rule(args: &[DataType]) -> Result<DataType, String> {
    let unified = unify_pair(&args[0], &args[1])?;
    match unified.scalar_kind() {
        Some(k) if k.is_float() => Ok(DataType::Scalar(k)),
        _ => Err(format!("expected floating operands, got {}", args[0])),
    }
}

fn dot_rule(args: &[DataType]) -> Result<DataType, String> {
    match (args[0].concretize(), args[1].concretize()) {
        (
            DataType::Vector { size: n, scalar: a },
            DataType::Vector { size: m, scalar: b },
        ) if n == m && a == b && a.is_numeric() => Ok(DataType::Scalar(a)),
        _ => Err(format!(
            "expected two matching numeric vectors, got {} and {}",
            args[0], args[1]
        )),
    }
}

fn cross_rule(args: &[DataType]) -> Result<DataType, String> {
    match (args[0].concretize(), args[1].concretize()) {
        (
            DataType::Vector { size: 3, scalar: a },
            DataType::Vector { size: 3, scalar: b },
        ) if a == b && a.is_float() => Ok(DataType::vec(3, a)),
        _ => Err(format!(
            "expected two vec3 floating vectors, got {} and {}",
            args[0], args[1]
        )),
    }
}

fn numeric_pair(args: &[DataType]) -> Result<DataType, String> {
    let ty = unify_pair(&args[0], &args[1])?;
    if ty.is_numeric() {
        Ok(ty)
    } else {
        Err(format!("expected numeric operands, got {}", args[0]))
    }
}

fn float_pair(args: &[DataType]) -> Result<DataType, String> {
    let ty = unify_pair(&args[0], &args[1])?;
    match ty.scalar_kind() {
        Some(k) if k.is_float() => Ok(ty),
        _ => Err(format!("expected floating operands, got {}", args[0])),
    }
}

fn numeric_triple(args: &[DataType]) -> Result<DataType, String> {
    let ty = unify_pair(&args[0], &args[1])?;
    let ty = unify_pair(&ty, &args[2])?;
    if ty.is_numeric() {
        Ok(ty)
    } else {
        Err("expected numeric operands".to_string())
    }
}

fn mix_rule(args: &[DataType]) -> Result<DataType, String> {
    let ty = unify_pair(&args[0], &args[1])?;
    match ty.scalar_kind() {
        Some(k) if k.is_float() => {}
        _ => return Err(format!("expected floating operands, got {}", args[0])),
    }
    // Third operand is either the same shape or a scalar factor.
    let factor = args[2].concretize();
    if factor == ty || (factor.is_scalar() && factor.scalar_kind() == ty.scalar_kind()) {
        Ok(ty)
    } else {
        Err(format!("mix factor of type {} does not match {ty}", args[2]))
    }
}

fn select_rule(args: &[DataType]) -> Result<DataType, String> {
    if !args[2].is_bool() {
        return Err(format!(
            "select condition must be bool, got {}",
            args[2]
        ));
    }
    unify_pair(&args[0], &args[1])
}

fn array_length_rule(args: &[DataType]) -> Result<DataType, String> {
    let inner = match &args[0] {
        DataType::Ptr { inner, .. } => inner.as_ref(),
        other => other,
    };
    match inner {
        DataType::Array { len: None, .. } => Ok(DataType::u32()),
        other => Err(format!("expected a runtime-sized array, got {other}")),
    }
}

fn texture_sample_rule(args: &[DataType]) -> Result<DataType, String> {
    match (&args[0], &args[1], &args[2].concretize()) {
        (DataType::Texture2d, DataType::Sampler, DataType::Vector { size: 2, scalar })
            if scalar.is_float() =>
        {
            Ok(DataType::vec4f())
        }
        _ => Err(format!(
            "expected (texture_2d<f32>, sampler, vec2<f32>), got ({}, {}, {})",
            args[0], args[1], args[2]
        )),
    }
}

fn texture_load_rule(args: &[DataType]) -> Result<DataType, String> {
    let coords_ok = matches!(
        args[1].concretize(),
        DataType::Vector { size: 2, scalar } if scalar.is_integer()
    );
    let level_ok = args[2]
        .concretize()
        .scalar_kind()
        .is_some_and(|k| k.is_integer());
    if matches!(args[0], DataType::Texture2d) && coords_ok && level_ok {
        Ok(DataType::vec4f())
    } else {
        Err(format!(
            "expected (texture_2d<f32>, vec2<i32|u32>, i32|u32), got ({}, {}, {})",
            args[0], args[1], args[2]
        ))
    }
}

/// Unify two scalar/vector types into one, abstract kinds adapting.
fn unify_pair(a: &DataType, b: &DataType) -> Result<DataType, String> {
    let mismatch = || format!("cannot unify {a} and {b}");
    let ka = a.scalar_kind().ok_or_else(mismatch)?;
    let kb = b.scalar_kind().ok_or_else(mismatch)?;
    let unified = scalar::unify(ka, kb).ok_or_else(mismatch)?;
    let shape = match (a, b) {
        (DataType::Vector { size: n, .. }, DataType::Vector { size: m, .. }) if n == m => *n,
        (DataType::Vector { size, .. }, DataType::Scalar(_)) => *size,
        (DataType::Scalar(_), DataType::Vector { size, .. }) => *size,
        (DataType::Scalar(_), DataType::Scalar(_)) => 1,
        _ => return Err(mismatch()),
    };
    let kind = unified.kind.concretize();
    Ok(if shape == 1 {
        DataType::Scalar(kind)
    } else {
        DataType::vec(shape, kind)
    })
}
