//! Stage-interface location planning.
//!
//! Each entry's user IO fields get a final `@location`: explicit
//! assignments are kept, the rest are auto-assigned smallest-free in
//! field order. For a vertex→fragment pair resolved together, the
//! producer's output locations are matched positionally onto the
//! consumer's inputs; when both sides explicitly assign different
//! locations to the same named value, the producer wins with a warning
//! rather than a failure.

use tracing::warn;

use crate::program::{EntryPoint, IoField, Stage};

/// Final location for each IO field; `None` for builtins.
#[derive(Debug, Clone, Default)]
pub(crate) struct IoPlan {
    pub inputs: Vec<Option<u32>>,
    pub outputs: Vec<Option<u32>>,
}

/// Plan locations for every entry, pairing the first vertex entry with
/// the first fragment entry.
pub(crate) fn plan(entries: &[EntryPoint]) -> Vec<IoPlan> {
    let mut plans: Vec<IoPlan> = entries
        .iter()
        .map(|e| IoPlan {
            inputs: assign(&e.inputs),
            outputs: assign(&e.outputs),
        })
        .collect();

    let vertex = entries.iter().position(|e| matches!(e.stage, Stage::Vertex));
    let fragment = entries
        .iter()
        .position(|e| matches!(e.stage, Stage::Fragment));
    if let (Some(v), Some(f)) = (vertex, fragment) {
        let produced: Vec<(String, Option<u32>, Option<u32>)> = entries[v]
            .outputs
            .iter()
            .zip(&plans[v].outputs)
            .filter(|(field, _)| field.builtin.is_none())
            .map(|(field, loc)| (field.name.clone(), field.location, *loc))
            .collect();

        let mut produced_iter = produced.iter();
        for (field, slot) in entries[f].inputs.iter().zip(plans[f].inputs.iter_mut()) {
            if field.builtin.is_some() {
                continue;
            }
            let Some((name, explicit, planned)) = produced_iter.next() else {
                break;
            };
            if let (Some(theirs), Some(ours)) = (explicit, field.location) {
                if *theirs != ours && *name == field.name {
                    warn!(
                        value = %name,
                        producer = *theirs,
                        consumer = ours,
                        "stage IO location mismatch; using the producer's location"
                    );
                }
            }
            *slot = *planned;
        }
    }

    plans
}

/// Keep explicit locations; fill the rest smallest-free in field order.
fn assign(fields: &[IoField]) -> Vec<Option<u32>> {
    let used: Vec<u32> = fields.iter().filter_map(|f| f.location).collect();
    let mut next = 0u32;
    fields
        .iter()
        .map(|field| {
            if field.builtin.is_some() {
                return None;
            }
            if let Some(loc) = field.location {
                return Some(loc);
            }
            while used.contains(&next) {
                next += 1;
            }
            let loc = next;
            next += 1;
            Some(loc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::{Block, FnDef};
    use weft_types::DataType;

    use crate::program::{BuiltinValue, ShaderFn};

    fn func() -> crate::program::FnHandle {
        ShaderFn::new(FnDef::new("f", vec![], Block::default())).build()
    }

    #[test]
    fn test_auto_assignment_skips_explicit() {
        let fields = vec![
            IoField::new("a", DataType::f32()),
            IoField::at("b", DataType::f32(), 0),
            IoField::new("c", DataType::f32()),
        ];
        // "a" avoids the explicit 0 taken by "b".
        assert_eq!(assign(&fields), vec![Some(1), Some(0), Some(2)]);
    }

    #[test]
    fn test_builtins_have_no_location() {
        let fields = vec![
            IoField::builtin("pos", BuiltinValue::Position, DataType::vec4f()),
            IoField::new("uv", DataType::vec2f()),
        ];
        assert_eq!(assign(&fields), vec![None, Some(0)]);
    }

    #[test]
    fn test_consumer_inherits_producer_location() {
        let vert = EntryPoint::vertex(func())
            .output(IoField::builtin(
                "pos",
                BuiltinValue::Position,
                DataType::vec4f(),
            ))
            .output(IoField::at("uv", DataType::vec2f(), 3));
        let frag = EntryPoint::fragment(func())
            .input(IoField::new("uv", DataType::vec2f()))
            .output(IoField::new("color", DataType::vec4f()));

        let plans = plan(&[vert, frag]);
        assert_eq!(plans[0].outputs, vec![None, Some(3)]);
        assert_eq!(plans[1].inputs, vec![Some(3)]);
    }

    #[test]
    fn test_explicit_mismatch_uses_producer() {
        let vert = EntryPoint::vertex(func())
            .output(IoField::builtin(
                "pos",
                BuiltinValue::Position,
                DataType::vec4f(),
            ))
            .output(IoField::at("uv", DataType::vec2f(), 1));
        let frag = EntryPoint::fragment(func())
            .input(IoField::at("uv", DataType::vec2f(), 2))
            .output(IoField::new("color", DataType::vec4f()));

        let plans = plan(&[vert, frag]);
        assert_eq!(plans[1].inputs, vec![Some(1)]);
    }
}
