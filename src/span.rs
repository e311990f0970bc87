use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open `[start, end)` character range into a document's raw text.
///
/// Offsets count Unicode scalar values, not bytes, because standoff tools index
/// the decoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether a token occupying `[start, end)` belongs to this span.
    ///
    /// A token is taken when the span starts inside it, when the span ends inside it,
    /// or when it sits strictly inside the span. Together the three cases pick every
    /// token that shares at least one character with the span, including a token
    /// bisected by either boundary and a token that contains the whole span.
    pub fn covers(&self, start: usize, end: usize) -> bool {
        (start <= self.start && self.start < end)
            || (start < self.end && self.end <= end)
            || (self.start < start && start < self.end && self.start < end && end < self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start, self.end)
    }
}
