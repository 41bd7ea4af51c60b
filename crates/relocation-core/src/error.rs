use thiserror::Error;

use crate::span::Span;

/// Error categories, flattened for callers that only need to branch on the
/// kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// Marker syntax did not match what the grammar requires.
    UnexpectedContent,
    /// The cursor was moved outside the document.
    OutOfRange,
    /// A section name exceeded the length bound.
    NameTooLong,
    /// Section start/end markers do not nest properly.
    UnbalancedBlock,
    /// The magic signature was followed by an unrecognized type code.
    UnknownMarkerKind,
    /// A section would end up containing itself.
    CyclicInjection,
}

impl ParseErrorKind {
    /// Stable name of this kind, used by the CLI and the Python bindings.
    pub const fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedContent => "UnexpectedContent",
            ParseErrorKind::OutOfRange => "OutOfRange",
            ParseErrorKind::NameTooLong => "NameTooLong",
            ParseErrorKind::UnbalancedBlock => "UnbalancedBlock",
            ParseErrorKind::UnknownMarkerKind => "UnknownMarkerKind",
            ParseErrorKind::CyclicInjection => "CyclicInjection",
        }
    }
}

/// Failures of the low-level [`Cursor`](crate::cursor::Cursor) primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// `read_until` never found its needle. Nothing was consumed.
    #[error("{needle:?} not found after offset {offset}")]
    Unterminated { needle: String, offset: usize },

    /// `expect` read something other than the required literal.
    #[error("expected {expected:?}, found {found:?} at offset {offset}")]
    UnexpectedContent {
        expected: String,
        found: String,
        offset: usize,
    },

    /// A seek resolved to a position outside `0..=len`, or inside a
    /// multi-byte character.
    #[error("position {position} is outside the document (0..={len})")]
    OutOfRange { position: isize, len: usize },
}

/// A fatal error raised while splitting a document into sections.
///
/// There is no partial result: the first error aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed marker at {span}: expected {expected:?}, found {found:?}")]
    UnexpectedContent {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("cursor out of range: position {position} in a document of {len} bytes")]
    OutOfRange { position: isize, len: usize },

    #[error("section name at {span} is {len} characters long (limit {max})")]
    NameTooLong { len: usize, max: usize, span: Span },

    #[error("section end at {span} has no matching section start")]
    UnbalancedBlock { span: Span },

    #[error("section {name:?} opened at {span} is never closed")]
    UnclosedSection { name: String, span: Span },

    #[error("unknown marker kind {code:?} at {span}")]
    UnknownMarkerKind { code: String, span: Span },

    #[error("section {name:?} cannot be injected into itself (at {span})")]
    CyclicInjection { name: String, span: Span },
}

impl ParseError {
    /// The category of this error.
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::UnexpectedContent { .. } => ParseErrorKind::UnexpectedContent,
            ParseError::OutOfRange { .. } => ParseErrorKind::OutOfRange,
            ParseError::NameTooLong { .. } => ParseErrorKind::NameTooLong,
            ParseError::UnbalancedBlock { .. } | ParseError::UnclosedSection { .. } => {
                ParseErrorKind::UnbalancedBlock
            }
            ParseError::UnknownMarkerKind { .. } => ParseErrorKind::UnknownMarkerKind,
            ParseError::CyclicInjection { .. } => ParseErrorKind::CyclicInjection,
        }
    }

    /// Where in the document the error was detected, if known.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedContent { span, .. }
            | ParseError::NameTooLong { span, .. }
            | ParseError::UnbalancedBlock { span }
            | ParseError::UnclosedSection { span, .. }
            | ParseError::UnknownMarkerKind { span, .. }
            | ParseError::CyclicInjection { span, .. } => Some(*span),
            ParseError::OutOfRange { .. } => None,
        }
    }
}

impl From<CursorError> for ParseError {
    fn from(err: CursorError) -> Self {
        match err {
            // A missing delimiter inside a marker is malformed syntax, not
            // the end-of-document signal.
            CursorError::Unterminated { needle, offset } => ParseError::UnexpectedContent {
                expected: needle,
                found: "end of document".to_string(),
                span: Span::at(offset),
            },
            CursorError::UnexpectedContent {
                expected,
                found,
                offset,
            } => ParseError::UnexpectedContent {
                span: Span::new(offset, offset + found.len()),
                expected,
                found,
            },
            CursorError::OutOfRange { position, len } => ParseError::OutOfRange { position, len },
        }
    }
}

/// Rejection of a section name handed to the marker emitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("section name is {len} characters long (limit {max})")]
    TooLong { len: usize, max: usize },

    #[error("section name must not contain {forbidden:?}")]
    Forbidden { forbidden: char },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclosed_section_is_an_unbalanced_block() {
        let err = ParseError::UnclosedSection {
            name: "css".into(),
            span: Span::new(0, 10),
        };
        assert_eq!(err.kind(), ParseErrorKind::UnbalancedBlock);
        assert_eq!(err.span(), Some(Span::new(0, 10)));
    }

    #[test]
    fn missing_delimiter_becomes_unexpected_content() {
        let err: ParseError = CursorError::Unterminated {
            needle: ">".into(),
            offset: 12,
        }
        .into();
        assert_eq!(err.kind(), ParseErrorKind::UnexpectedContent);
        assert_eq!(
            err.to_string(),
            "malformed marker at 12..12: expected \">\", found \"end of document\""
        );
    }
}
