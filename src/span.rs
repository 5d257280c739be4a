//! Source locations attached to tokens, AST nodes and diagnostics.

use std::fmt;

/// A byte range in a formula's source text with its starting line and column (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering both `self` and `other`, keeping the position of the earlier one.
    pub fn merge(&self, other: &Span) -> Span {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: first.line,
            column: first.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_earliest_position() {
        let a = Span::new(4, 6, 1, 5);
        let b = Span::new(0, 2, 1, 1);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(0, 6, 1, 1));
    }
}
