//! Forward-only cursor over the rendered document.
//!
//! The parser consumes the document through a handful of substring-search
//! primitives. Every scan starts at the current offset and never looks
//! behind it, so a full parse touches each byte a bounded number of times.
//!
//! # Performance
//!
//! - Zero-copy: everything returned borrows from the input
//! - Substring search via `memchr::memmem` (SIMD on supported platforms)
//! - A prebuilt [`Finder`] can be reused for the hot needle

use std::io::SeekFrom;

use memchr::memmem::{self, Finder};

use crate::error::CursorError;

/// A seekable, read-only view over a string with a current byte offset.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Cursor<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    /// Current byte offset.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total length of the underlying text in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.input.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.offset >= self.input.len()
    }

    /// The unconsumed tail of the input.
    #[inline(always)]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.offset..]
    }

    /// Read the next `n` characters, or everything left when `n` is `None`
    /// or larger than the remainder. Advances past what was returned.
    pub fn read(&mut self, n: Option<usize>) -> &'a str {
        let rest = self.remaining();
        let end = match n {
            None => rest.len(),
            Some(n) => rest
                .char_indices()
                .nth(n)
                .map_or(rest.len(), |(idx, _)| idx),
        };
        self.offset += end;
        &rest[..end]
    }

    /// Move the cursor. Returns the new absolute offset.
    ///
    /// Fails without moving if the target lies outside `0..=len` or falls
    /// inside a multi-byte character.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<usize, CursorError> {
        let len = self.input.len() as isize;
        let target = match pos {
            SeekFrom::Start(n) => isize::try_from(n).unwrap_or(isize::MAX),
            SeekFrom::Current(delta) => (self.offset as isize).saturating_add(delta as isize),
            SeekFrom::End(delta) => len.saturating_add(delta as isize),
        };
        if target < 0 || target > len || !self.input.is_char_boundary(target as usize) {
            return Err(CursorError::OutOfRange {
                position: target,
                len: self.input.len(),
            });
        }
        self.offset = target as usize;
        Ok(self.offset)
    }

    /// Offset of the first `needle`, relative to the current position.
    ///
    /// `from` and `to` bound the search window, also relative to the current
    /// position; `to` is clamped to the end of the input.
    pub fn find(&self, needle: &str, from: Option<usize>, to: Option<usize>) -> Option<usize> {
        let rest = self.remaining().as_bytes();
        let from = from.unwrap_or(0);
        let to = to.map_or(rest.len(), |to| to.min(rest.len()));
        if from > to {
            return None;
        }
        memmem::find(&rest[from..to], needle.as_bytes()).map(|idx| idx + from)
    }

    /// Return everything before the next `needle` and advance past it.
    ///
    /// On failure nothing is consumed.
    pub fn read_until(&mut self, needle: &str) -> Result<&'a str, CursorError> {
        match self.find(needle, None, None) {
            Some(idx) => Ok(self.take_through(idx, needle.len())),
            None => Err(self.unterminated(needle)),
        }
    }

    /// Like [`read_until`](Self::read_until) with a prebuilt searcher.
    pub fn read_until_finder(&mut self, finder: &Finder<'_>) -> Result<&'a str, CursorError> {
        let needle = finder.needle();
        match finder.find(self.remaining().as_bytes()) {
            Some(idx) => Ok(self.take_through(idx, needle.len())),
            None => Err(self.unterminated(&String::from_utf8_lossy(needle))),
        }
    }

    /// Consume `literal`, failing if the input has anything else there.
    pub fn expect(&mut self, literal: &str) -> Result<(), CursorError> {
        let offset = self.offset;
        let found = self.read(Some(literal.chars().count()));
        if found == literal {
            Ok(())
        } else {
            Err(CursorError::UnexpectedContent {
                expected: literal.to_string(),
                found: found.to_string(),
                offset,
            })
        }
    }

    #[inline(always)]
    fn take_through(&mut self, idx: usize, needle_len: usize) -> &'a str {
        let start = self.offset;
        self.offset = start + idx + needle_len;
        &self.input[start..start + idx]
    }

    fn unterminated(&self, needle: &str) -> CursorError {
        CursorError::Unterminated {
            needle: needle.to_string(),
            offset: self.offset,
        }
    }
}
