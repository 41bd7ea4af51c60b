//! Post-parse processing.
//!
//! A [`Pipeline`] parses a rendered document and hands the result to an
//! ordered list of processors. Each processor may rewrite sections in
//! place; because destinations are live references, the final render picks
//! up every rewrite without a second parse.

use log::debug;
use thiserror::Error;

use crate::error::ParseError;
use crate::parser::Parser;
use crate::relocated::Relocated;
use crate::segment::SegmentError;
use crate::store::StoreError;

/// Failure reported by a single processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessorError {
    pub fn msg(message: impl Into<String>) -> Self {
        ProcessorError::Message(message.into())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("processor {processor:?} failed: {source}")]
    Processor {
        processor: String,
        #[source]
        source: ProcessorError,
    },
}

/// One step of post-processing.
///
/// `document` identifies the rendered document (typically the template
/// name) so processors can derive cache keys or URLs from it.
pub trait Processor {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    fn process(&self, document: &str, relocated: &mut Relocated<'_>) -> Result<(), ProcessorError>;
}

/// A named closure acting as a [`Processor`].
pub struct FnProcessor<F> {
    name: String,
    func: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&str, &mut Relocated<'_>) -> Result<(), ProcessorError>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&str, &mut Relocated<'_>) -> Result<(), ProcessorError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, document: &str, relocated: &mut Relocated<'_>) -> Result<(), ProcessorError> {
        (self.func)(document, relocated)
    }
}

/// Parser plus an ordered list of processors.
///
/// ```rust
/// use relocation_core::{begin_section, end_section, inject_here, Pipeline};
///
/// let doc = format!(
///     "<head>{}</head>{}h1 {{}}{}",
///     inject_here("css").unwrap(),
///     begin_section("css").unwrap(),
///     end_section(),
/// );
/// let pipeline = Pipeline::new().with_fn("upper", |_, relocated| {
///     if let Some(mut css) = relocated.section_mut("css") {
///         let text = css.flatten().to_uppercase();
///         css.replace(text);
///     }
///     Ok(())
/// });
/// assert_eq!(pipeline.relocate("page.html", &doc).unwrap(), "<head>H1 {}</head>");
/// ```
#[derive(Default)]
pub struct Pipeline {
    parser: Parser,
    processors: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    /// Append a processor; processors run in insertion order.
    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Append a closure processor.
    pub fn with_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &mut Relocated<'_>) -> Result<(), ProcessorError> + 'static,
    {
        self.with(FnProcessor::new(name, func))
    }

    pub fn push(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the configured processors, in run order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run every processor, in order, over an existing parse result.
    pub fn apply(&self, document: &str, relocated: &mut Relocated<'_>) -> Result<(), PipelineError> {
        for processor in &self.processors {
            debug!("running processor {:?} on {:?}", processor.name(), document);
            processor
                .process(document, relocated)
                .map_err(|source| PipelineError::Processor {
                    processor: processor.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Parse `text` and run the processors over the result.
    pub fn run<'a>(&self, document: &str, text: &'a str) -> Result<Relocated<'a>, PipelineError> {
        let mut relocated = self.parser.parse(text)?;
        self.apply(document, &mut relocated)?;
        Ok(relocated)
    }

    /// Parse, process, and render the main buffer.
    pub fn relocate(&self, document: &str, text: &str) -> Result<String, PipelineError> {
        Ok(self.run(document, text)?.render())
    }
}
