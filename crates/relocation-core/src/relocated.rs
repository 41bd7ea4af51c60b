//! The parse result: a main buffer plus named section buffers.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::segment::{Chunk, Segment, SegmentId, SegmentMut, Segments};

/// Output of [`Parser::parse`](crate::Parser::parse).
///
/// `main` and every section live in one [`Segments`] arena. Destination
/// markers in `main` are live references, so rewriting a section after the
/// parse changes what [`render`](Self::render) returns.
#[derive(Debug, Clone)]
pub struct Relocated<'a> {
    segments: Segments<'a>,
    main: SegmentId,
    sections: BTreeMap<String, SegmentId>,
    markers: usize,
}

impl<'a> Relocated<'a> {
    pub(crate) fn new(
        segments: Segments<'a>,
        main: SegmentId,
        sections: BTreeMap<String, SegmentId>,
        markers: usize,
    ) -> Self {
        Self {
            segments,
            main,
            sections,
            markers,
        }
    }

    /// The root buffer.
    pub fn main(&self) -> Segment<'_, 'a> {
        self.segments.segment(self.main)
    }

    pub fn main_mut(&mut self) -> SegmentMut<'_, 'a> {
        self.segments.segment_mut(self.main)
    }

    pub fn main_id(&self) -> SegmentId {
        self.main
    }

    pub fn section(&self, name: &str) -> Option<Segment<'_, 'a>> {
        let id = *self.sections.get(name)?;
        Some(self.segments.segment(id))
    }

    pub fn section_mut(&mut self, name: &str) -> Option<SegmentMut<'_, 'a>> {
        let id = *self.sections.get(name)?;
        Some(self.segments.segment_mut(id))
    }

    pub fn section_id(&self, name: &str) -> Option<SegmentId> {
        self.sections.get(name).copied()
    }

    pub fn contains_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Look up `name`, creating an empty section if it was never referenced.
    pub fn ensure_section(&mut self, name: &str) -> SegmentMut<'_, 'a> {
        let id = match self.sections.get(name) {
            Some(id) => *id,
            None => {
                let id = self.segments.create();
                self.sections.insert(name.to_string(), id);
                id
            }
        };
        self.segments.segment_mut(id)
    }

    /// Replace the content of an existing section. Returns `false` if no
    /// section called `name` exists.
    pub fn replace_section(&mut self, name: &str, text: impl Into<Chunk<'a>>) -> bool {
        match self.section_mut(name) {
            Some(mut section) => {
                section.replace(text);
                true
            }
            None => false,
        }
    }

    /// Point `name` at a different segment, returning the one it replaced.
    ///
    /// Destinations already spliced into other buffers keep referencing the
    /// previous segment.
    pub fn rebind_section(&mut self, name: &str, id: SegmentId) -> Option<SegmentId> {
        self.sections.insert(name.to_string(), id)
    }

    /// Sections in name order.
    pub fn sections(&self) -> Sections<'_, 'a> {
        Sections {
            segments: &self.segments,
            inner: self.sections.iter(),
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of markers consumed by the parse.
    pub fn markers(&self) -> usize {
        self.markers
    }

    pub fn segments(&self) -> &Segments<'a> {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut Segments<'a> {
        &mut self.segments
    }

    /// Flatten `main` in its current state.
    pub fn render(&self) -> String {
        self.segments.flatten(self.main)
    }

    /// Copy every borrowed chunk so the result outlives the document.
    pub fn into_owned(self) -> Relocated<'static> {
        Relocated {
            segments: self.segments.into_owned(),
            main: self.main,
            sections: self.sections,
            markers: self.markers,
        }
    }

    pub fn into_parts(self) -> (Segments<'a>, SegmentId, BTreeMap<String, SegmentId>) {
        (self.segments, self.main, self.sections)
    }
}

/// Iterator over `(name, section)` pairs, see [`Relocated::sections`].
pub struct Sections<'s, 'a> {
    segments: &'s Segments<'a>,
    inner: btree_map::Iter<'s, String, SegmentId>,
}

impl<'s, 'a> Iterator for Sections<'s, 'a> {
    type Item = (&'s str, Segment<'s, 'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let (name, id) = self.inner.next()?;
        Some((name.as_str(), self.segments.segment(*id)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Sections<'_, '_> {}

#[cfg(test)]
mod tests {
    use crate::{begin_section, deserialize, end_section, inject_here};

    fn sample() -> String {
        format!(
            "<head>{}</head>{}h1{{}}{}<body/>",
            inject_here("css").unwrap(),
            begin_section("css").unwrap(),
            end_section()
        )
    }

    #[test]
    fn ensure_section_creates_once() {
        let doc = sample();
        let mut relocated = deserialize(&doc).unwrap();
        assert!(!relocated.contains_section("js"));
        relocated.ensure_section("js").append_back("a");
        relocated.ensure_section("js").append_back("b");
        assert_eq!(relocated.section("js").unwrap().flatten(), "ab");
        assert_eq!(relocated.section_count(), 2);
    }

    #[test]
    fn replace_section_reports_missing() {
        let doc = sample();
        let mut relocated = deserialize(&doc).unwrap();
        assert!(!relocated.replace_section("js", "x"));
        assert!(relocated.replace_section("css", "p{}"));
        assert_eq!(relocated.render(), "<head>p{}</head><body/>");
    }

    #[test]
    fn rebind_leaves_destinations_alone() {
        let doc = sample();
        let mut relocated = deserialize(&doc).unwrap();
        let copy = relocated.segments_mut().create();
        relocated.segments_mut().append_back(copy, "detached");
        relocated.rebind_section("css", copy);

        assert_eq!(relocated.section("css").unwrap().flatten(), "detached");
        assert_eq!(relocated.render(), "<head>h1{}</head><body/>");
    }

    #[test]
    fn sections_iterate_in_name_order() {
        let doc = format!(
            "{}{}",
            inject_here("zeta").unwrap(),
            inject_here("alpha").unwrap()
        );
        let relocated = deserialize(&doc).unwrap();
        let names: Vec<_> = relocated.sections().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn owned_result_outlives_document() {
        let relocated = {
            let doc = sample();
            deserialize(&doc).unwrap().into_owned()
        };
        assert_eq!(relocated.render(), "<head>h1{}</head><body/>");
        assert_eq!(relocated.markers(), 3);
    }
}
