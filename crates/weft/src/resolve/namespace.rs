//! Per-resolution naming registry.
//!
//! The namespace maps a logical declaration identity to a collision-free
//! final name, exactly once: repeat claims for the same identity return
//! the same name forever. A "name assigned" event fires once per identity
//! into a drainable queue, which is how a long-lived namespace shared
//! across *sequential* resolutions lets the second resolution skip
//! declarations the first one already surfaced.
//!
//! Sharing a namespace across two *overlapping* resolutions is unsound;
//! the API takes `&mut self` everywhere so the borrow checker enforces
//! exclusive use within one `resolve` call.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::error::{ErrorKind, ResolveError, ResolveResult};

/// Logical identity of a declaration, the namespace key.
///
/// Identity tokens are in-process pointers of the shared handles, so two
/// clones of one handle are one identity and two structurally identical
/// definitions are two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameKey {
    /// Struct schema identity.
    Struct(usize),
    /// Module-scope variable identity.
    Global(usize),
    /// Function identity plus specialization signature.
    Fn(usize, String),
    /// Entry-point function identity.
    Entry(usize),
    /// Stage-interface struct of an entry point.
    IoStruct(usize),
    /// Console-log infrastructure piece (record struct, buffer, ...).
    LogInfra(&'static str),
    /// Console-log encoder or serializer, keyed by type signature.
    LogHelper(String),
    /// Console-log call-site wrapper, keyed by record id.
    LogSite(u32),
}

/// Outcome of a name claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimed {
    /// The final name.
    pub name: String,
    /// Whether this claim minted the name (false: an earlier claim,
    /// possibly from a prior resolution sharing this namespace, owns it).
    pub fresh: bool,
}

/// Target-language words that can never be identifiers.
const RESERVED: &[&str] = &[
    "alias", "array", "atomic", "bool", "break", "case", "const", "continue", "continuing",
    "default", "discard", "else", "enable", "f16", "f32", "fn", "for", "i32", "if", "let", "loop",
    "mat2x2", "mat3x3", "mat4x4", "override", "ptr", "return", "sampler", "struct", "switch",
    "texture_2d", "true", "false", "u32", "var", "vec2", "vec3", "vec4", "while",
];

/// Check if a user-chosen identifier is legal in emitted code.
///
/// Reserved words and the double-underscore prefix are rejected; callers
/// surface the result as an illegal-identifier resolution error.
pub fn check_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("identifiers may not be empty".to_string());
    }
    if RESERVED.contains(&name) {
        return Err(format!("'{name}' is a reserved word"));
    }
    if name.starts_with("__") {
        return Err(format!("'{name}' uses the reserved '__' prefix"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.starts_with(|c: char| c.is_ascii_digit())
    {
        return Err(format!("'{name}' is not a valid identifier"));
    }
    Ok(())
}

/// The naming registry.
#[derive(Debug, Default)]
pub struct Namespace {
    assigned: IndexMap<NameKey, String>,
    taken: HashSet<String>,
    events: Vec<(NameKey, String)>,
}

impl Namespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a name for `key`.
    ///
    /// The preferred name is used if free; otherwise `preferred_{n}` for
    /// the smallest free `n`. Repeat claims return the already-assigned
    /// name with `fresh: false` and fire no further event.
    pub fn claim(&mut self, key: NameKey, preferred: &str) -> ResolveResult<Claimed> {
        if let Some(name) = self.assigned.get(&key) {
            return Ok(Claimed {
                name: name.clone(),
                fresh: false,
            });
        }

        let base = sanitize(preferred);
        check_identifier(&base).map_err(|reason| {
            ResolveError::new(ErrorKind::IllegalIdentifier, reason).with_value(preferred)
        })?;

        let name = if self.taken.contains(&base) {
            let mut n = 1usize;
            loop {
                let candidate = format!("{base}_{n}");
                if !self.taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            base
        };

        self.taken.insert(name.clone());
        self.assigned.insert(key.clone(), name.clone());
        self.events.push((key, name.clone()));
        Ok(Claimed { name, fresh: true })
    }

    /// Mark a name as taken without binding an identity to it.
    ///
    /// Locals use this: a local shadowing a not-yet-named global pushes
    /// the *global* to a suffixed name, never the local.
    pub fn block(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    /// The name assigned to an identity, if any claim has happened.
    pub fn name_of(&self, key: &NameKey) -> Option<&str> {
        self.assigned.get(key).map(String::as_str)
    }

    /// Drain the pending "name assigned" events, oldest first.
    pub fn drain_events(&mut self) -> Vec<(NameKey, String)> {
        std::mem::take(&mut self.events)
    }
}

/// Replace characters the target rejects; keep the result readable.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> NameKey {
        NameKey::Struct(n)
    }

    #[test]
    fn test_claim_is_stable_per_identity() {
        let mut ns = Namespace::new();
        let first = ns.claim(key(1), "Particle").unwrap();
        let again = ns.claim(key(1), "Particle").unwrap();

        assert_eq!(first.name, "Particle");
        assert!(first.fresh);
        assert_eq!(again.name, "Particle");
        assert!(!again.fresh);
    }

    #[test]
    fn test_collision_takes_smallest_suffix() {
        let mut ns = Namespace::new();
        assert_eq!(ns.claim(key(1), "dot2").unwrap().name, "dot2");
        assert_eq!(ns.claim(key(2), "dot2").unwrap().name, "dot2_1");
        assert_eq!(ns.claim(key(3), "dot2").unwrap().name, "dot2_2");
    }

    #[test]
    fn test_names_never_shared_between_identities() {
        let mut ns = Namespace::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..20 {
            let claimed = ns.claim(key(i), "name").unwrap();
            assert!(seen.insert(claimed.name));
        }
    }

    #[test]
    fn test_blocked_name_pushes_global_aside() {
        let mut ns = Namespace::new();
        ns.block("threshold");
        assert_eq!(ns.claim(key(1), "threshold").unwrap().name, "threshold_1");
    }

    #[test]
    fn test_one_event_per_identity() {
        let mut ns = Namespace::new();
        ns.claim(key(1), "A").unwrap();
        ns.claim(key(1), "A").unwrap();
        ns.claim(key(2), "B").unwrap();

        let events = ns.drain_events();
        assert_eq!(events.len(), 2);
        assert!(ns.drain_events().is_empty());
    }

    #[test]
    fn test_reserved_word_rejected() {
        let mut ns = Namespace::new();
        let err = ns.claim(key(1), "struct").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalIdentifier);

        let err = ns.claim(key(2), "__hidden").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalIdentifier);
    }

    #[test]
    fn test_sanitize_invalid_chars() {
        let mut ns = Namespace::new();
        let claimed = ns.claim(key(1), "my struct!").unwrap();
        assert_eq!(claimed.name, "my_struct_");
    }
}
