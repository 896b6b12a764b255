//! Structural violation reports
//!
//! A validation call produces an ordered [`ViolationSet`]; an empty set means
//! the message conforms. Violations carry enough detail (pointer + reason)
//! for a human to diagnose the mismatch from a test failure message.

use serde::{Deserialize, Serialize};

/// A single structural mismatch between a message and its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Where the mismatch sits: a JSON pointer into the decoded body
    /// (`/id`), or a locator such as `query/limit`, `path/user_id`,
    /// `header/content-type`, `status`, `body`.
    pub pointer: String,
    /// Human-readable reason
    pub reason: String,
}

impl Violation {
    #[must_use]
    pub fn new(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut pointer = pointer.into();
        // Root-level schema errors come back with an empty instance path
        if pointer.is_empty() {
            pointer.push('/');
        }
        Self {
            pointer,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pointer, self.reason)
    }
}

/// Ordered sequence of violations produced by one validation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSet {
    violations: Vec<Violation>,
}

impl ViolationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation at `pointer` with the given reason.
    pub fn add(&mut self, pointer: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(Violation::new(pointer, reason));
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, other: ViolationSet) {
        self.violations.extend(other.violations);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }
}

impl From<Vec<Violation>> for ViolationSet {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl IntoIterator for ViolationSet {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

impl std::fmt::Display for ViolationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "no violations");
        }
        writeln!(f, "{} violation(s):", self.violations.len())?;
        for (idx, violation) in self.violations.iter().enumerate() {
            writeln!(f, "  {}. {violation}", idx + 1)?;
        }
        Ok(())
    }
}
