//! Lexical scope stack for transpilation.
//!
//! The bottom layer holds the function's externals and parameters; every
//! block pushes a fresh layer. Lookup walks innermost-out, so locals
//! shadow parameters and externals. Shadowing is legal; the namespace is
//! told to keep local names away from not-yet-named globals instead of
//! renaming the local.

use indexmap::IndexMap;

use crate::program::External;
use weft_types::Snippet;

/// What an identifier resolves to.
#[derive(Debug, Clone)]
pub(crate) enum ScopeEntry {
    /// A local binding.
    Local {
        snippet: Snippet,
        mutable: bool,
        is_ref: bool,
    },
    /// A function parameter (immutable; references to it are rejected).
    Param { snippet: Snippet },
    /// An external from the function's externals map.
    Extern(External),
}

/// Stack of name layers, innermost last.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    layers: Vec<IndexMap<String, ScopeEntry>>,
}

impl Scope {
    /// A scope with one base layer.
    pub fn new() -> Self {
        Self {
            layers: vec![IndexMap::new()],
        }
    }

    /// Push a block layer.
    pub fn push(&mut self) {
        self.layers.push(IndexMap::new());
    }

    /// Pop the innermost layer.
    pub fn pop(&mut self) {
        self.layers.pop();
    }

    /// Bind a name in the innermost layer.
    pub fn declare(&mut self, name: impl Into<String>, entry: ScopeEntry) {
        if let Some(layer) = self.layers.last_mut() {
            layer.insert(name.into(), entry);
        }
    }

    /// Resolve a name, innermost layer first.
    pub fn lookup(&self, name: &str) -> Option<&ScopeEntry> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::{DataType, Origin};

    fn local(name: &str) -> ScopeEntry {
        ScopeEntry::Local {
            snippet: Snippet::new(name, DataType::f32(), Origin::Local),
            mutable: false,
            is_ref: false,
        }
    }

    #[test]
    fn test_inner_layer_shadows_outer() {
        let mut scope = Scope::new();
        scope.declare("x", local("outer"));
        scope.push();
        scope.declare("x", local("inner"));

        match scope.lookup("x") {
            Some(ScopeEntry::Local { snippet, .. }) => assert_eq!(snippet.render(), "inner"),
            other => panic!("unexpected entry: {other:?}"),
        }

        scope.pop();
        match scope.lookup("x") {
            Some(ScopeEntry::Local { snippet, .. }) => assert_eq!(snippet.render(), "outer"),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn test_missing_name() {
        let scope = Scope::new();
        assert!(scope.lookup("nope").is_none());
    }
}
