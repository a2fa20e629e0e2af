//! Diagnostics: the error taxonomy and deduplicated warning sets.
//!
//! Local rewrite failures never become global failures — they abort the
//! rewrite for one node and the driver moves on. Only assertion-class
//! errors (broken tree invariants) halt a pass.

use indexmap::IndexSet;
use thiserror::Error;

use crate::base::Name;
use crate::tree::NodeId;

/// Failure of a single local rewrite.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RewriteError {
    /// A construct the current rewrite cannot handle; the tree is left
    /// unchanged for that node.
    #[error("unsupported construct")]
    Unsupported,

    /// A required type could not be derived.
    #[error("value cannot be typed")]
    NotTypeable,

    /// Broken invariant in the tree. Halts the pass.
    #[error("assertion failed: {0}")]
    Fatal(String),
}

pub type RewriteResult<T> = Result<T, RewriteError>;

/// Pass-level errors surfaced to callers.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HifError {
    /// Broken invariant, referencing the offending object.
    #[error("assertion failed on {object:?}: {message}")]
    Assertion { message: String, object: Option<NodeId> },

    /// No top-level module where the caller required at least one.
    #[error("unable to find top-level design unit")]
    NoTopLevel,

    /// Several top-level candidates where the caller required at most one.
    #[error("found more than one top-level design unit ({0} candidates)")]
    AmbiguousTopLevel(usize),

    /// A named top level that does not resolve or is not a top level.
    #[error("top-level design unit `{0}` not found among candidates")]
    TopLevelNameNotFound(String),
}

impl HifError {
    pub fn assertion(message: impl Into<String>, object: Option<NodeId>) -> Self {
        Self::Assertion {
            message: message.into(),
            object,
        }
    }
}

impl From<RewriteError> for HifError {
    fn from(e: RewriteError) -> Self {
        match e {
            RewriteError::Fatal(msg) => HifError::Assertion {
                message: msg,
                object: None,
            },
            other => HifError::Assertion {
                message: other.to_string(),
                object: None,
            },
        }
    }
}

/// Deduplicated set of per-pass warnings, summarized once when flushed.
#[derive(Debug, Default)]
pub struct WarningSet {
    entries: IndexSet<Name>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subject: Name) {
        self.entries.insert(subject);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.entries.contains(subject)
    }

    /// Emit a single summary warning naming every subject, then clear.
    pub fn flush(&mut self, message: &str) {
        if self.entries.is_empty() {
            return;
        }
        let subjects: Vec<&str> = self.entries.iter().map(|n| n.as_str()).collect();
        tracing::warn!(subjects = ?subjects, "{message}");
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_set_deduplicates() {
        let mut set = WarningSet::new();
        set.insert(Name::new("sig"));
        set.insert(Name::new("sig"));
        set.insert(Name::new("other"));
        assert_eq!(set.len(), 2);
        set.flush("multi-write fixed");
        assert!(set.is_empty());
    }
}
