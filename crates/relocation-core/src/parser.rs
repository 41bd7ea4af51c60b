//! Single-pass relocation parser.
//!
//! Literal text is appended to whichever buffer is on top of the capture
//! stack. Section starts push the named section, section ends pop it, and
//! destinations splice a live reference to the named section into the
//! current buffer. Literal spans are borrowed, never copied.

use std::collections::BTreeMap;

use log::{debug, trace};
use memchr::memmem::Finder;

use crate::cursor::Cursor;
use crate::error::ParseError;
use crate::marker::{Marker, MAGIC};
use crate::relocated::Relocated;
use crate::segment::{SegmentId, Segments};
use crate::span::Span;

/// Relocation parser.
///
/// By default a section left open at the end of the document is an error.
/// [`allow_unclosed_sections`](Self::allow_unclosed_sections) switches to
/// the lenient behavior where the unclosed section silently keeps the rest
/// of the document.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    allow_unclosed_sections: bool,
}

/// A capture block that has been opened and not yet closed.
#[derive(Debug, Clone, Copy)]
struct OpenBlock<'a> {
    segment: SegmentId,
    name: &'a str,
    span: Span,
}

/// A destination marker, kept so a cycle found after the pass can be
/// reported at the marker that closed it.
#[derive(Debug, Clone, Copy)]
struct Destination<'a> {
    into: SegmentId,
    target: SegmentId,
    name: &'a str,
    span: Span,
}

impl Parser {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_unclosed_sections(mut self, allow: bool) -> Self {
        self.allow_unclosed_sections = allow;
        self
    }

    /// Split `input` into a main buffer and named sections.
    pub fn parse<'a>(&self, input: &'a str) -> Result<Relocated<'a>, ParseError> {
        let finder = Finder::new(MAGIC);
        let mut cursor = Cursor::new(input);
        let mut segments = Segments::new();
        let main = segments.create();
        let mut sections: BTreeMap<String, SegmentId> = BTreeMap::new();
        // Open capture blocks above the root; the root itself is never popped.
        let mut stack: Vec<OpenBlock<'a>> = Vec::new();
        let mut destinations: Vec<Destination<'a>> = Vec::new();
        let mut markers = 0usize;

        loop {
            let top = stack.last().map_or(main, |block| block.segment);
            let literal = match cursor.read_until_finder(&finder) {
                Ok(literal) => literal,
                Err(_) => {
                    // No further markers: the tail belongs to the current buffer.
                    let tail = cursor.read(None);
                    if !tail.is_empty() {
                        segments.append_back(top, tail);
                    }
                    break;
                }
            };
            if !literal.is_empty() {
                segments.append_back(top, literal);
            }

            let start = cursor.offset() - MAGIC.len();
            let marker = Marker::read(&mut cursor, start)?;
            let span = Span::new(start, cursor.offset());
            markers += 1;
            trace!("marker {:?} at {}", marker, span);

            match marker {
                Marker::SectionStart(name) => {
                    let segment = section_for(&mut segments, &mut sections, name);
                    stack.push(OpenBlock {
                        segment,
                        name,
                        span,
                    });
                }
                Marker::SectionEnd => {
                    if stack.pop().is_none() {
                        return Err(ParseError::UnbalancedBlock { span });
                    }
                }
                Marker::Destination(name) => {
                    let target = section_for(&mut segments, &mut sections, name);
                    segments.splice_unchecked(top, target);
                    destinations.push(Destination {
                        into: top,
                        target,
                        name,
                        span,
                    });
                }
            }
        }

        // Cycles are checked once, after every destination has been linked.
        if let Some((target, into)) = segments.find_cycle() {
            let (name, span) = destinations
                .iter()
                .find(|d| d.target == target && d.into == into)
                .map(|d| (d.name, d.span))
                .unwrap_or_else(|| {
                    let name = sections
                        .iter()
                        .find(|(_, id)| **id == target)
                        .map_or("", |(name, _)| name.as_str());
                    (name, Span::at(input.len()))
                });
            return Err(ParseError::CyclicInjection {
                name: name.to_string(),
                span,
            });
        }

        if let Some(open) = stack.last() {
            if !self.allow_unclosed_sections {
                return Err(ParseError::UnclosedSection {
                    name: open.name.to_string(),
                    span: open.span,
                });
            }
            debug!(
                "{} section(s) left open at end of document, innermost {:?}",
                stack.len(),
                open.name
            );
        }

        debug!(
            "relocated {} bytes: {} marker(s), {} section(s)",
            input.len(),
            markers,
            sections.len()
        );
        Ok(Relocated::new(segments, main, sections, markers))
    }
}

/// The section called `name`, created on first reference.
fn section_for(
    segments: &mut Segments<'_>,
    sections: &mut BTreeMap<String, SegmentId>,
    name: &str,
) -> SegmentId {
    if let Some(id) = sections.get(name) {
        return *id;
    }
    let id = segments.create();
    sections.insert(name.to_string(), id);
    id
}
