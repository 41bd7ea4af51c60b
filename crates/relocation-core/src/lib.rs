//! # Relocation Core
//!
//! Single-pass section relocation for rendered template output.
//!
//! A template emits inline markers saying "this text belongs to section S"
//! and "inject section S here". [`deserialize`] walks the rendered document
//! once and splits it into a main buffer and named section buffers.
//! Injection points in the main buffer are live references, so a section
//! rewritten after parsing (minified, replaced by a `<script src>`, ...)
//! shows up in the final render without parsing again.
//!
//! ## Quick Start
//!
//! ```rust
//! use relocation_core::{begin_section, deserialize, end_section, inject_here};
//!
//! let page = format!(
//!     "<head>{}</head><body>{}alert(1);{}</body>",
//!     inject_here("js").unwrap(),
//!     begin_section("js").unwrap(),
//!     end_section(),
//! );
//!
//! let mut relocated = deserialize(&page).unwrap();
//! assert_eq!(relocated.render(), "<head>alert(1);</head><body></body>");
//!
//! relocated.replace_section("js", "<script src=\"/app.js\"></script>");
//! assert_eq!(
//!     relocated.render(),
//!     "<head><script src=\"/app.js\"></script></head><body></body>"
//! );
//! ```
//!
//! ## Modules
//!
//! - [`cursor`] - forward-only substring scanning over the document
//! - [`marker`] - the marker grammar and its fixed vocabulary
//! - [`emit`] - marker text for producers
//! - [`segment`] - the aliasing segment-buffer arena
//! - [`parser`] - the single-pass state machine
//! - [`pipeline`], [`processors`], [`store`] - post-parse rewriting

pub mod cursor;
pub mod emit;
pub mod error;
pub mod marker;
pub mod parser;
pub mod pipeline;
pub mod processors;
pub mod relocated;
pub mod segment;
pub mod span;
pub mod store;

pub use emit::{begin_section, capture, end_section, inject_here};
pub use error::{CursorError, NameError, ParseError, ParseErrorKind};
pub use marker::{Marker, MarkerKind, MAGIC, MAX_NAME_LEN};
pub use parser::Parser;
pub use pipeline::{FnProcessor, Pipeline, PipelineError, Processor, ProcessorError};
pub use processors::{Concat, Externify, ExternifyRule};
pub use relocated::Relocated;
pub use segment::{PaneId, Segment, SegmentError, SegmentId, SegmentMut, Segments, Slot};
pub use store::{MemoryStore, SectionStore, StoreError, StoreKey, StoredSection};

/// Parse `document` with the default (strict) parser.
pub fn deserialize(document: &str) -> Result<Relocated<'_>, ParseError> {
    Parser::new().parse(document)
}

/// Parse `document` and render the main buffer with every section injected.
pub fn do_relocation(document: &str) -> Result<String, ParseError> {
    Ok(deserialize(document)?.render())
}
