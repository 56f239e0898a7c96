//! Resolution error reporting.
//!
//! Every failure is synchronous and structured: a category, a rule
//! description, the offending value's textual form, and a breadcrumb
//! trail from the resolution root to the failing construct
//! (`<root> → fn:foo → fn*:bar(f32, f32)`). Nothing is retried and output
//! is never partial; the caller fixes the source and re-resolves.

use std::fmt;

/// Category of resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operand or branch types cannot be unified.
    TypeUnification,
    /// Mutation of immutable state, or a reference escaping its rules.
    IllegalMutation,
    /// Reserved words, disallowed prefixes, unresolvable identifiers.
    IllegalIdentifier,
    /// A construct outside the restricted subset.
    UnsupportedConstruct,
    /// A log record exceeding the configured per-record capacity.
    CapacityExceeded,
    /// A bug in the resolver itself.
    Internal,
}

impl ErrorKind {
    /// Human-readable category name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::TypeUnification => "type unification failed",
            ErrorKind::IllegalMutation => "illegal mutation",
            ErrorKind::IllegalIdentifier => "illegal identifier",
            ErrorKind::UnsupportedConstruct => "unsupported construct",
            ErrorKind::CapacityExceeded => "capacity exceeded",
            ErrorKind::Internal => "internal resolver error",
        }
    }
}

/// A structured resolution failure.
///
/// Built close to the failing construct, then annotated with the
/// breadcrumb trail as it propagates out of the resolution walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Rule description.
    pub message: String,
    /// Textual form of the offending value, if one exists.
    pub value: Option<String>,
    /// Breadcrumb path from the resolution root to the failure.
    pub trail: Vec<String>,
    /// Suggested fixes and extra context.
    pub notes: Vec<String>,
}

impl ResolveError {
    /// Create an error with a rule description.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            trail: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Attach the offending value's textual form.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach a suggested fix or extra context.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Attach the breadcrumb trail (root first). Later calls win only if
    /// no trail was recorded yet, so the innermost annotation survives.
    pub fn at(mut self, trail: &[String]) -> Self {
        if self.trail.is_empty() {
            self.trail = trail.to_vec();
        }
        self
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)?;
        if let Some(value) = &self.value {
            write!(f, " (value: {value})")?;
        }
        if !self.trail.is_empty() {
            write!(f, " at {}", self.trail.join(" → "))?;
        }
        for note in &self.notes {
            write!(f, "\n  = help: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_trail_and_notes() {
        let err = ResolveError::new(ErrorKind::IllegalMutation, "cannot mutate a parameter")
            .with_value("x")
            .with_note("copy the parameter into a var first")
            .at(&[
                "<root>".to_string(),
                "fn:main".to_string(),
                "fn*:scale(f32)".to_string(),
            ]);

        let text = err.to_string();
        assert!(text.contains("illegal mutation"));
        assert!(text.contains("(value: x)"));
        assert!(text.contains("<root> → fn:main → fn*:scale(f32)"));
        assert!(text.contains("help: copy the parameter"));
    }

    #[test]
    fn test_innermost_trail_wins() {
        let inner = vec!["<root>".to_string(), "fn:inner".to_string()];
        let outer = vec!["<root>".to_string()];
        let err = ResolveError::new(ErrorKind::TypeUnification, "mismatch")
            .at(&inner)
            .at(&outer);
        assert_eq!(err.trail, inner);
    }
}
