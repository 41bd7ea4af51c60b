//! Byte ranges into the rendered document.
//!
//! Errors and markers carry a `Span` so a failure can be traced back to the
//! exact place in the template output that produced it.

use std::fmt;

/// A byte range in the document, `[start, end)`.
///
/// # Example
///
/// ```rust
/// use relocation_core::span::Span;
///
/// let span = Span::new(4, 10);
/// assert_eq!(span.len(), 6);
/// assert_eq!(span.to_string(), "4..10");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: usize,
    /// Ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span from byte offsets.
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span sitting at `offset`.
    #[inline]
    pub const fn at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_saturates_on_inverted_span() {
        let span = Span::new(9, 3);
        assert_eq!(span.len(), 0);
        assert!(span.is_empty());
    }

    #[test]
    fn empty_span_at_offset() {
        let span = Span::at(7);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
        assert_eq!(span.to_string(), "7..7");
    }
}
