//! Segment buffers: aliasable, insertion-ordered text containers.
//!
//! All buffers produced by one parse live in a single [`Segments`] arena.
//! A segment is an ordered list of *slots*; a slot is either a pane (an
//! ordered run of text chunks, owned by the arena and addressed by
//! [`PaneId`]) or a live reference to another segment. Two segments share a
//! pane iff the same `PaneId` appears in both slot lists.
//!
//! ```text
//!   main:  [ Pane(0) | Segment(css) | Pane(2) ]
//!   css:   [ Pane(1) ]
//! ```
//!
//! Flattening `main` walks its slots in order and descends into `css`, so
//! whatever `css` holds *at flatten time* appears between panes 0 and 2.
//! Writes only ever land in the first or last pane reachable from a segment.
//!
//! Segments never contain themselves: [`Segments::branch`] and
//! [`Segments::splice`] refuse to build a cycle.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

/// One run of document text. Literal spans borrow from the parsed
/// document; text written by processors is owned.
pub type Chunk<'a> = Cow<'a, str>;

/// Handle to a segment inside a [`Segments`] arena.
///
/// Ids are only meaningful for the arena that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(u32);

/// Handle to a pane inside a [`Segments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(u32);

impl SegmentId {
    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl PaneId {
    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An entry in a segment's slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Pane(PaneId),
    /// Live reference: flattening descends into the referenced segment.
    Segment(SegmentId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Splicing `segment` into `into` would make a segment contain itself.
    #[error("segment {segment} already contains segment {into}; splicing would form a cycle")]
    Cycle { segment: SegmentId, into: SegmentId },
}

#[derive(Debug, Clone, Default)]
struct Pane<'a> {
    chunks: VecDeque<Chunk<'a>>,
}

#[derive(Debug, Clone, Default)]
struct SegmentData {
    slots: Vec<Slot>,
}

/// Arena owning every pane and segment of one parse result.
#[derive(Debug, Clone, Default)]
pub struct Segments<'a> {
    panes: Vec<Pane<'a>>,
    segments: Vec<SegmentData>,
}

impl<'a> Segments<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, empty pane that no segment references yet.
    pub fn new_pane(&mut self) -> PaneId {
        let id = PaneId(self.panes.len() as u32);
        self.panes.push(Pane::default());
        id
    }

    /// Create a segment holding one empty pane.
    pub fn create(&mut self) -> SegmentId {
        let pane = self.new_pane();
        self.push_segment(vec![Slot::Pane(pane)])
    }

    fn push_segment(&mut self, slots: Vec<Slot>) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(SegmentData { slots });
        id
    }

    /// Number of segments ever allocated in this arena.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of panes ever allocated in this arena.
    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    /// Read-only handle to `id`.
    pub fn segment(&self, id: SegmentId) -> Segment<'_, 'a> {
        Segment { arena: self, id }
    }

    /// Mutable handle to `id`.
    pub fn segment_mut(&mut self, id: SegmentId) -> SegmentMut<'_, 'a> {
        SegmentMut { arena: self, id }
    }

    /// The slot list of `id`, in flatten order.
    pub fn slots(&self, id: SegmentId) -> &[Slot] {
        &self.segments[id.index()].slots
    }

    /// Panes referenced directly by `id` (not through nested segments).
    pub fn panes(&self, id: SegmentId) -> Panes<'_> {
        Panes {
            slots: self.slots(id).iter(),
        }
    }

    /// Whether `a` and `b` directly reference a common pane.
    pub fn shares_pane(&self, a: SegmentId, b: SegmentId) -> bool {
        self.panes(a).any(|pane| self.panes(b).any(|other| other == pane))
    }

    /// Whether flattening `outer` visits `inner`, directly or transitively.
    /// A segment does not contain itself.
    pub fn contains(&self, outer: SegmentId, inner: SegmentId) -> bool {
        let mut visited = vec![false; self.segments.len()];
        let mut pending = vec![outer];
        while let Some(id) = pending.pop() {
            for slot in self.slots(id) {
                if let Slot::Segment(nested) = *slot {
                    if nested == inner {
                        return true;
                    }
                    if !visited[nested.index()] {
                        visited[nested.index()] = true;
                        pending.push(nested);
                    }
                }
            }
        }
        false
    }

    /// Add a chunk after everything else in `id`.
    ///
    /// If the last slot is a nested segment the chunk lands in that
    /// segment's last pane, mirroring where flattening would place it.
    pub fn append_back(&mut self, id: SegmentId, text: impl Into<Chunk<'a>>) {
        let pane = self.edge_pane(id, Edge::Back);
        self.panes[pane.index()].chunks.push_back(text.into());
    }

    /// Add a chunk before everything else in `id`.
    pub fn append_front(&mut self, id: SegmentId, text: impl Into<Chunk<'a>>) {
        let pane = self.edge_pane(id, Edge::Front);
        self.panes[pane.index()].chunks.push_front(text.into());
    }

    /// Freeze the current slots of `id` and open a new writable tail.
    ///
    /// Returns a snapshot segment referencing exactly the slots `id` had
    /// before the call; the snapshot shares those panes with `id`. The new
    /// tail is `shared` when given, otherwise a fresh empty pane.
    pub fn branch(&mut self, id: SegmentId, shared: Option<Slot>) -> Result<SegmentId, SegmentError> {
        let tail = match shared {
            Some(slot) => {
                self.check_acyclic(id, slot)?;
                slot
            }
            None => Slot::Pane(self.new_pane()),
        };
        let snapshot = self.slots(id).to_vec();
        let snapshot = self.push_segment(snapshot);
        self.segments[id.index()].slots.push(tail);
        Ok(snapshot)
    }

    /// Splice a live reference to `target` into `id`, then reopen a private
    /// pane so later writes to `id` stay after the injected content.
    ///
    /// Equivalent to `branch(id, Some(Slot::Segment(target)))` followed by
    /// `branch(id, None)`, minus the two snapshot segments.
    pub fn splice(&mut self, id: SegmentId, target: SegmentId) -> Result<(), SegmentError> {
        self.check_acyclic(id, Slot::Segment(target))?;
        self.splice_unchecked(id, target);
        Ok(())
    }

    /// [`splice`](Self::splice) without the cycle check.
    ///
    /// The arena may end up cyclic; callers must run
    /// [`find_cycle`](Self::find_cycle) before flattening anything.
    pub(crate) fn splice_unchecked(&mut self, id: SegmentId, target: SegmentId) {
        let pane = self.new_pane();
        let slots = &mut self.segments[id.index()].slots;
        slots.push(Slot::Segment(target));
        slots.push(Slot::Pane(pane));
    }

    /// Find a segment reference that closes a cycle, as `(segment, into)`:
    /// `segment` is referenced from `into` while `into` is reachable from
    /// `segment`. One depth-first pass over the whole arena.
    pub fn find_cycle(&self) -> Option<(SegmentId, SegmentId)> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut marks = vec![Mark::New; self.segments.len()];
        let mut stack: Vec<(SegmentId, usize)> = Vec::new();
        for root in 0..self.segments.len() {
            if marks[root] != Mark::New {
                continue;
            }
            marks[root] = Mark::Active;
            stack.push((SegmentId(root as u32), 0));
            while let Some((id, idx)) = stack.last_mut() {
                let id = *id;
                let Some(slot) = self.slots(id).get(*idx).copied() else {
                    marks[id.index()] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *idx += 1;
                if let Slot::Segment(nested) = slot {
                    match marks[nested.index()] {
                        Mark::Active => return Some((nested, id)),
                        Mark::New => {
                            marks[nested.index()] = Mark::Active;
                            stack.push((nested, 0));
                        }
                        Mark::Done => {}
                    }
                }
            }
        }
        None
    }

    /// Detach `id` from all of its slots and give it one fresh empty pane.
    ///
    /// Pane contents are left untouched, so snapshots and other segments
    /// that share those panes keep seeing the old text. Segments that
    /// reference `id` itself see the cleared state.
    pub fn clear(&mut self, id: SegmentId) {
        let pane = self.new_pane();
        self.segments[id.index()].slots = vec![Slot::Pane(pane)];
    }

    /// Lazily iterate the chunks of `id` in flatten order.
    ///
    /// Each call starts over and reflects the current state.
    pub fn chunks(&self, id: SegmentId) -> Chunks<'_, 'a> {
        Chunks {
            inner: self.raw_chunks(id),
        }
    }

    fn raw_chunks(&self, id: SegmentId) -> RawChunks<'_, 'a> {
        RawChunks {
            arena: self,
            stack: vec![(self.slots(id), 0)],
            current: None,
        }
    }

    /// Total number of chunks reachable from `id`.
    pub fn chunk_count(&self, id: SegmentId) -> usize {
        self.raw_chunks(id).count()
    }

    /// Concatenate every chunk of `id`.
    pub fn flatten(&self, id: SegmentId) -> String {
        let mut out = String::with_capacity(self.raw_chunks(id).map(|c| c.len()).sum());
        for chunk in self.raw_chunks(id) {
            out.push_str(chunk);
        }
        out
    }

    /// An independent segment holding the current chunks of `id` in one
    /// pane. Later changes to either side are not shared.
    pub fn deep_copy(&mut self, id: SegmentId) -> SegmentId {
        let chunks: VecDeque<Chunk<'a>> = self.raw_chunks(id).cloned().collect();
        let pane = PaneId(self.panes.len() as u32);
        self.panes.push(Pane { chunks });
        self.push_segment(vec![Slot::Pane(pane)])
    }

    /// Detach the arena from the document it borrows from.
    pub fn into_owned(self) -> Segments<'static> {
        let panes = self
            .panes
            .into_iter()
            .map(|pane| Pane {
                chunks: pane
                    .chunks
                    .into_iter()
                    .map(|chunk| Cow::Owned(chunk.into_owned()))
                    .collect(),
            })
            .collect();
        Segments {
            panes,
            segments: self.segments,
        }
    }

    fn check_acyclic(&self, id: SegmentId, slot: Slot) -> Result<(), SegmentError> {
        match slot {
            Slot::Segment(target) if target == id || self.contains(target, id) => {
                Err(SegmentError::Cycle {
                    segment: target,
                    into: id,
                })
            }
            _ => Ok(()),
        }
    }

    /// First or last pane reachable from `id`, following nested segments.
    fn edge_pane(&mut self, id: SegmentId, edge: Edge) -> PaneId {
        let mut current = id;
        loop {
            let slots = &self.segments[current.index()].slots;
            let slot = match edge {
                Edge::Front => slots.first(),
                Edge::Back => slots.last(),
            };
            match slot.copied() {
                Some(Slot::Pane(pane)) => return pane,
                Some(Slot::Segment(nested)) => current = nested,
                None => {
                    let pane = self.new_pane();
                    self.segments[current.index()].slots.push(Slot::Pane(pane));
                    return pane;
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Edge {
    Front,
    Back,
}

/// Depth-first walk over the chunks reachable from one segment.
struct RawChunks<'s, 'a> {
    arena: &'s Segments<'a>,
    stack: Vec<(&'s [Slot], usize)>,
    current: Option<std::collections::vec_deque::Iter<'s, Chunk<'a>>>,
}

impl<'s, 'a> Iterator for RawChunks<'s, 'a> {
    type Item = &'s Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.current.as_mut().and_then(Iterator::next) {
                return Some(chunk);
            }
            self.current = None;

            let (slots, idx) = self.stack.last_mut()?;
            let Some(slot) = slots.get(*idx).copied() else {
                self.stack.pop();
                continue;
            };
            *idx += 1;
            match slot {
                Slot::Pane(pane) => {
                    self.current = Some(self.arena.panes[pane.index()].chunks.iter());
                }
                Slot::Segment(nested) => {
                    self.stack.push((self.arena.slots(nested), 0));
                }
            }
        }
    }
}

/// Chunks of a segment in flatten order, see [`Segments::chunks`].
pub struct Chunks<'s, 'a> {
    inner: RawChunks<'s, 'a>,
}

impl<'s, 'a> Iterator for Chunks<'s, 'a> {
    type Item = &'s str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|chunk| chunk.as_ref())
    }
}

/// Panes referenced directly by a segment, see [`Segments::panes`].
pub struct Panes<'s> {
    slots: std::slice::Iter<'s, Slot>,
}

impl Iterator for Panes<'_> {
    type Item = PaneId;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.by_ref().find_map(|slot| match slot {
            Slot::Pane(pane) => Some(*pane),
            Slot::Segment(_) => None,
        })
    }
}

/// Read-only view of one segment.
#[derive(Clone, Copy)]
pub struct Segment<'s, 'a> {
    arena: &'s Segments<'a>,
    id: SegmentId,
}

impl<'s, 'a> Segment<'s, 'a> {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn chunks(&self) -> Chunks<'s, 'a> {
        self.arena.chunks(self.id)
    }

    pub fn flatten(&self) -> String {
        self.arena.flatten(self.id)
    }

    /// Chunk count across all panes. Diagnostic only: empty chunks count.
    pub fn len(&self) -> usize {
        self.arena.chunk_count(self.id)
    }

    /// Whether the segment flattens to the empty string.
    pub fn is_empty(&self) -> bool {
        self.chunks().all(str::is_empty)
    }

    pub fn slots(&self) -> &'s [Slot] {
        self.arena.slots(self.id)
    }
}

impl fmt::Display for Segment<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Segment<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("slots", &self.slots())
            .finish()
    }
}

/// Mutable view of one segment.
pub struct SegmentMut<'s, 'a> {
    arena: &'s mut Segments<'a>,
    id: SegmentId,
}

impl<'s, 'a> SegmentMut<'s, 'a> {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn append_back(&mut self, text: impl Into<Chunk<'a>>) -> &mut Self {
        self.arena.append_back(self.id, text);
        self
    }

    pub fn append_front(&mut self, text: impl Into<Chunk<'a>>) -> &mut Self {
        self.arena.append_front(self.id, text);
        self
    }

    /// See [`Segments::branch`].
    pub fn branch(&mut self, shared: Option<Slot>) -> Result<SegmentId, SegmentError> {
        self.arena.branch(self.id, shared)
    }

    /// See [`Segments::splice`].
    pub fn splice(&mut self, target: SegmentId) -> Result<(), SegmentError> {
        self.arena.splice(self.id, target)
    }

    pub fn clear(&mut self) -> &mut Self {
        self.arena.clear(self.id);
        self
    }

    /// Replace the content wholesale: `clear` followed by `append_back`.
    pub fn replace(&mut self, text: impl Into<Chunk<'a>>) -> &mut Self {
        self.arena.clear(self.id);
        self.arena.append_back(self.id, text);
        self
    }

    pub fn flatten(&self) -> String {
        self.arena.flatten(self.id)
    }

    pub fn as_segment(&self) -> Segment<'_, 'a> {
        self.arena.segment(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_land_at_edges() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena.append_back(seg, "b");
        arena.append_back(seg, "c");
        arena.append_front(seg, "a");
        assert_eq!(arena.flatten(seg), "abc");
        assert_eq!(arena.chunk_count(seg), 3);
    }

    #[test]
    fn branch_freezes_snapshot() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena.append_back(seg, "before");
        let snapshot = arena.branch(seg, None).unwrap();
        arena.append_back(seg, " after");

        assert_eq!(arena.flatten(seg), "before after");
        assert_eq!(arena.flatten(snapshot), "before");
        assert!(arena.shares_pane(seg, snapshot));
    }

    #[test]
    fn snapshot_sees_front_writes_to_shared_pane() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena.append_back(seg, "x");
        let snapshot = arena.branch(seg, None).unwrap();
        arena.append_front(seg, ">");
        assert_eq!(arena.flatten(snapshot), ">x");
    }

    #[test]
    fn branch_with_shared_pane() {
        let mut arena = Segments::new();
        let a = arena.create();
        let b = arena.create();
        let shared = arena.new_pane();
        arena.append_back(a, "a:");
        arena.branch(a, Some(Slot::Pane(shared))).unwrap();
        arena.branch(b, Some(Slot::Pane(shared))).unwrap();
        arena.append_back(b, "shared");
        assert_eq!(arena.flatten(a), "a:shared");
        assert!(arena.shares_pane(a, b));
    }

    #[test]
    fn splice_stays_live() {
        let mut arena = Segments::new();
        let main = arena.create();
        let section = arena.create();
        arena.append_back(main, "A");
        arena.splice(main, section).unwrap();
        arena.append_back(main, "B");
        arena.append_back(section, "C");
        assert_eq!(arena.flatten(main), "ACB");

        arena.clear(section);
        arena.append_back(section, "Z");
        assert_eq!(arena.flatten(main), "AZB");
    }

    #[test]
    fn clear_detaches_without_touching_panes() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena.append_back(seg, "old");
        let snapshot = arena.branch(seg, None).unwrap();
        arena.clear(seg);
        arena.append_back(seg, "new");

        assert_eq!(arena.flatten(seg), "new");
        assert_eq!(arena.flatten(snapshot), "old");
        assert!(!arena.shares_pane(seg, snapshot));
    }

    #[test]
    fn append_through_trailing_reference() {
        let mut arena = Segments::new();
        let outer = arena.create();
        let inner = arena.create();
        arena.branch(outer, Some(Slot::Segment(inner))).unwrap();
        arena.append_back(outer, "text");
        assert_eq!(arena.flatten(inner), "text");
        assert_eq!(arena.flatten(outer), "text");
    }

    #[test]
    fn self_splice_is_rejected() {
        let mut arena = Segments::new();
        let seg = arena.create();
        assert_eq!(
            arena.splice(seg, seg),
            Err(SegmentError::Cycle {
                segment: seg,
                into: seg
            })
        );
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let mut arena = Segments::new();
        let a = arena.create();
        let b = arena.create();
        arena.splice(a, b).unwrap();
        assert!(arena.contains(a, b));
        assert!(arena.splice(b, a).is_err());
        assert!(arena.branch(b, Some(Slot::Segment(a))).is_err());
    }

    #[test]
    fn iteration_is_restartable() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena.append_back(seg, "one");
        let first: Vec<_> = arena.chunks(seg).map(str::to_owned).collect();
        arena.append_back(seg, "two");
        let second: Vec<_> = arena.chunks(seg).collect();
        assert_eq!(first, vec!["one"]);
        assert_eq!(second, vec!["one", "two"]);
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut arena = Segments::new();
        let main = arena.create();
        let nested = arena.create();
        arena.append_back(nested, "n");
        arena.append_back(main, "m");
        arena.splice(main, nested).unwrap();

        let copy = arena.deep_copy(main);
        arena.append_back(nested, "!");
        assert_eq!(arena.flatten(copy), "mn");
        assert_eq!(arena.flatten(main), "mn!");
    }

    #[test]
    fn handles_chain_writes() {
        let mut arena = Segments::new();
        let seg = arena.create();
        arena
            .segment_mut(seg)
            .append_back("b")
            .append_front("a")
            .append_back(String::from("c"));
        let view = arena.segment(seg);
        assert_eq!(view.to_string(), "abc");
        assert_eq!(view.len(), 3);
        assert!(!view.is_empty());
    }

    #[test]
    fn into_owned_keeps_structure() {
        let text = String::from("borrowed");
        let mut arena = Segments::new();
        let main = arena.create();
        let section = arena.create();
        arena.append_back(main, text.as_str());
        arena.splice(main, section).unwrap();
        let owned: Segments<'static> = arena.into_owned();
        drop(text);
        assert_eq!(owned.flatten(main), "borrowed");
        assert_eq!(owned.slots(main).len(), 3);
    }

    #[test]
    fn find_cycle_reports_closing_reference() {
        let mut arena = Segments::new();
        let main = arena.create();
        let a = arena.create();
        let b = arena.create();
        arena.splice_unchecked(main, a);
        arena.splice_unchecked(a, b);
        assert_eq!(arena.find_cycle(), None);

        arena.splice_unchecked(b, a);
        assert_eq!(arena.find_cycle(), Some((a, b)));
    }

    #[test]
    fn find_cycle_accepts_shared_targets() {
        let mut arena = Segments::new();
        let main = arena.create();
        let shared = arena.create();
        let leaf = arena.create();
        for _ in 0..3 {
            arena.splice_unchecked(main, shared);
            arena.splice_unchecked(shared, leaf);
        }
        assert_eq!(arena.find_cycle(), None);

        arena.splice_unchecked(leaf, leaf);
        assert_eq!(arena.find_cycle(), Some((leaf, leaf)));
    }
}
