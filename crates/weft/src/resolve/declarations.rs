//! Arena-style declaration table.
//!
//! Declarations are index-addressed rather than linked as an object graph,
//! so a cyclic call graph is just a cycle over indices and the dependency
//! walk stays bounded by the number of distinct declarations. A slot is
//! allocated (and named) *before* its body is rendered, which is what lets
//! a recursive call render against its own, still-empty slot.

use crate::error::{ErrorKind, ResolveError, ResolveResult};

/// Index of a declaration in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub(crate) usize);

/// What a declaration is, for emission grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Struct,
    Global,
    Function,
    Entry,
}

/// One named declaration, immutable once its text is rendered.
#[derive(Debug)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Rendered text; empty while the declaration is still being built.
    pub text: String,
    /// Declarations this one references, in reference order.
    pub deps: Vec<DeclId>,
    /// False when a prior resolution sharing the namespace already
    /// surfaced this declaration; it is then named but not re-emitted.
    pub emit: bool,
}

/// The table. Lifetime-bound to one resolution run.
#[derive(Debug, Default)]
pub struct DeclArena {
    decls: Vec<Declaration>,
}

impl DeclArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot with a name; text and deps are filled later.
    pub fn alloc(&mut self, kind: DeclKind, name: String, emit: bool) -> DeclId {
        self.decls.push(Declaration {
            kind,
            name,
            text: String::new(),
            deps: Vec::new(),
            emit,
        });
        DeclId(self.decls.len() - 1)
    }

    /// Fill a slot's rendered text and dependency list.
    pub fn finish(&mut self, id: DeclId, text: String, deps: Vec<DeclId>) -> ResolveResult<()> {
        let decl = self
            .decls
            .get_mut(id.0)
            .ok_or_else(|| ResolveError::new(ErrorKind::Internal, "declaration index out of range"))?;
        if !decl.text.is_empty() {
            return Err(ResolveError::new(
                ErrorKind::Internal,
                format!("declaration '{}' rendered twice", decl.name),
            ));
        }
        decl.text = text;
        decl.deps = deps;
        Ok(())
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    /// Walk the dependency closure of `roots` depth-first and return every
    /// reachable declaration id in dependency-before-dependent order.
    ///
    /// Each declaration is visited once, so cyclic graphs terminate; a
    /// declaration in a cycle is ordered by its first discovery.
    pub fn closure(&self, roots: &[DeclId]) -> Vec<DeclId> {
        let mut ordered = Vec::new();
        let mut state = vec![VisitState::Unvisited; self.decls.len()];
        for &root in roots {
            self.visit(root, &mut state, &mut ordered);
        }
        ordered
    }

    fn visit(&self, id: DeclId, state: &mut [VisitState], ordered: &mut Vec<DeclId>) {
        match state[id.0] {
            VisitState::Done | VisitState::InProgress => return,
            VisitState::Unvisited => {}
        }
        state[id.0] = VisitState::InProgress;
        for &dep in &self.decls[id.0].deps {
            self.visit(dep, state, ordered);
        }
        state[id.0] = VisitState::Done;
        ordered.push(id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_orders_dependencies_first() {
        let mut arena = DeclArena::new();
        let a = arena.alloc(DeclKind::Function, "a".into(), true);
        let b = arena.alloc(DeclKind::Function, "b".into(), true);
        let c = arena.alloc(DeclKind::Function, "c".into(), true);
        arena.finish(a, "fn a".into(), vec![b]).unwrap();
        arena.finish(b, "fn b".into(), vec![c]).unwrap();
        arena.finish(c, "fn c".into(), vec![]).unwrap();

        let order = arena.closure(&[a]);
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_closure_handles_cycles() {
        let mut arena = DeclArena::new();
        let a = arena.alloc(DeclKind::Function, "a".into(), true);
        let b = arena.alloc(DeclKind::Function, "b".into(), true);
        arena.finish(a, "fn a".into(), vec![b]).unwrap();
        arena.finish(b, "fn b".into(), vec![a]).unwrap();

        let order = arena.closure(&[a]);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_unreachable_declarations_excluded() {
        let mut arena = DeclArena::new();
        let a = arena.alloc(DeclKind::Function, "a".into(), true);
        let dead = arena.alloc(DeclKind::Function, "dead".into(), true);
        arena.finish(a, "fn a".into(), vec![]).unwrap();
        arena.finish(dead, "fn dead".into(), vec![]).unwrap();

        let order = arena.closure(&[a]);
        assert_eq!(order, vec![a]);
    }

    #[test]
    fn test_double_render_is_internal_error() {
        let mut arena = DeclArena::new();
        let a = arena.alloc(DeclKind::Struct, "A".into(), true);
        arena.finish(a, "struct A {}".into(), vec![]).unwrap();
        let err = arena.finish(a, "struct A {}".into(), vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
