//! The marker grammar.
//!
//! ```text
//! marker := MAGIC TYPE_CODE [ NAME_START name NAME_END ]
//! ```
//!
//! `name` is present for section starts and destinations only. The
//! vocabulary is fixed for the whole process; the emitter and the parser
//! read it from the same constants so they can never disagree.

use std::fmt;

use crate::cursor::Cursor;
use crate::error::{NameError, ParseError};
use crate::span::Span;

/// Signature that introduces every marker. Chosen to never appear in
/// ordinary document content.
pub const MAGIC: &str = "e50c9dec8d54890ad1b1405eb2229bd24d7f3f3f";

/// Type code of a section start marker.
pub const SECTION_START: &str = "RS";
/// Type code of a section end marker.
pub const SECTION_END: &str = "RE";
/// Type code of a destination (injection point) marker.
pub const DESTINATION: &str = "DM";

/// Length of every type code, in characters.
pub const TYPE_CODE_LEN: usize = 2;

pub const NAME_START: char = '<';
pub const NAME_END: char = '>';

/// Upper bound on section name length, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// The three marker kinds, identified on the wire by their type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    SectionStart,
    SectionEnd,
    Destination,
}

impl MarkerKind {
    /// The 2-character wire code.
    pub const fn code(self) -> &'static str {
        match self {
            MarkerKind::SectionStart => SECTION_START,
            MarkerKind::SectionEnd => SECTION_END,
            MarkerKind::Destination => DESTINATION,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            SECTION_START => Some(MarkerKind::SectionStart),
            SECTION_END => Some(MarkerKind::SectionEnd),
            DESTINATION => Some(MarkerKind::Destination),
            _ => None,
        }
    }

    /// Whether the marker carries a bracketed name.
    pub const fn takes_name(self) -> bool {
        !matches!(self, MarkerKind::SectionEnd)
    }
}

/// A decoded marker. Names borrow from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker<'a> {
    SectionStart(&'a str),
    SectionEnd,
    Destination(&'a str),
}

impl<'a> Marker<'a> {
    pub fn kind(&self) -> MarkerKind {
        match self {
            Marker::SectionStart(_) => MarkerKind::SectionStart,
            Marker::SectionEnd => MarkerKind::SectionEnd,
            Marker::Destination(_) => MarkerKind::Destination,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        match *self {
            Marker::SectionStart(name) | Marker::Destination(name) => Some(name),
            Marker::SectionEnd => None,
        }
    }

    /// Decode the marker body that follows a [`MAGIC`] signature.
    ///
    /// `start` is the offset of the signature itself and only feeds spans in
    /// error reports.
    pub fn read(cursor: &mut Cursor<'a>, start: usize) -> Result<Self, ParseError> {
        let code = cursor.read(Some(TYPE_CODE_LEN));
        let kind = MarkerKind::from_code(code).ok_or_else(|| ParseError::UnknownMarkerKind {
            code: code.to_string(),
            span: Span::new(start, cursor.offset()),
        })?;

        Ok(match kind {
            MarkerKind::SectionStart => Marker::SectionStart(read_name(cursor, start)?),
            MarkerKind::SectionEnd => Marker::SectionEnd,
            MarkerKind::Destination => Marker::Destination(read_name(cursor, start)?),
        })
    }
}

impl fmt::Display for Marker<'_> {
    /// Writes the exact wire form of the marker.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MAGIC)?;
        f.write_str(self.kind().code())?;
        if let Some(name) = self.name() {
            write!(f, "{NAME_START}{name}{NAME_END}")?;
        }
        Ok(())
    }
}

fn read_name<'a>(cursor: &mut Cursor<'a>, start: usize) -> Result<&'a str, ParseError> {
    let mut buf = [0u8; 4];
    cursor.expect(NAME_START.encode_utf8(&mut buf))?;
    let name = cursor.read_until(NAME_END.encode_utf8(&mut buf))?;
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ParseError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
            span: Span::new(start, cursor.offset()),
        });
    }
    Ok(name)
}

/// Check that `name` can travel inside a marker and be parsed back.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.contains(NAME_END) {
        return Err(NameError::Forbidden {
            forbidden: NAME_END,
        });
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    fn decode(body: &str) -> Result<Marker<'_>, ParseError> {
        let mut cursor = Cursor::new(body);
        Marker::read(&mut cursor, 0)
    }

    #[test]
    fn codes_round_trip() {
        for kind in [
            MarkerKind::SectionStart,
            MarkerKind::SectionEnd,
            MarkerKind::Destination,
        ] {
            assert_eq!(MarkerKind::from_code(kind.code()), Some(kind));
            assert_eq!(kind.code().len(), TYPE_CODE_LEN);
        }
        assert_eq!(MarkerKind::from_code("XX"), None);
    }

    #[test]
    fn decodes_each_kind() {
        assert_eq!(decode("RS<css>").unwrap(), Marker::SectionStart("css"));
        assert_eq!(decode("RE").unwrap(), Marker::SectionEnd);
        assert_eq!(decode("DM<js>rest").unwrap(), Marker::Destination("js"));
    }

    #[test]
    fn unknown_code() {
        let err = decode("XX").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnknownMarkerKind);
    }

    #[test]
    fn truncated_code_is_unknown() {
        let err = decode("R").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownMarkerKind {
                code: "R".into(),
                span: Span::new(0, 1)
            }
        );
    }

    #[test]
    fn missing_name_start() {
        let err = decode("RScss>").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnexpectedContent);
    }

    #[test]
    fn missing_name_end() {
        let err = decode("DM<css").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnexpectedContent);
    }

    #[test]
    fn name_bound_is_inclusive() {
        let ok = format!("RS<{}>", "a".repeat(MAX_NAME_LEN));
        assert!(decode(&ok).is_ok());
        let long = format!("RS<{}>", "a".repeat(MAX_NAME_LEN + 1));
        assert_eq!(decode(&long).unwrap_err().kind(), ParseErrorKind::NameTooLong);
    }

    #[test]
    fn display_is_wire_form() {
        assert_eq!(
            Marker::Destination("css").to_string(),
            format!("{MAGIC}DM<css>")
        );
        assert_eq!(Marker::SectionEnd.to_string(), format!("{MAGIC}RE"));
    }

    #[test]
    fn validate_rejects_terminator() {
        assert_eq!(
            validate_name("a>b"),
            Err(NameError::Forbidden { forbidden: '>' })
        );
        assert!(validate_name("").is_ok());
    }
}
