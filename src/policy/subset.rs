//! Subset-index and selection-flag exchange.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::layout::interface::Interface;
use crate::policy::{BufferSize, CommunicationPolicy};
use crate::topology::element::{ElementId, ElementKind};
use crate::topology::global_id::{GlobalId, GlobalIdRegistry};
use crate::topology::subsets::{SelectionMap, SubsetMap};

/// Wire value of an element without subset.
const UNSET: i32 = -1;

/// A received subset index that was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubsetConflict {
    pub partner: usize,
    pub kind: ElementKind,
    pub element: ElementId,
    pub global_id: Option<GlobalId>,
    /// Value kept locally.
    pub local: i32,
    /// Value sent by the partner.
    pub received: i32,
}

/// Exchanges subset indices of interface elements.
///
/// Extraction assigns a received index only to elements whose subset is
/// still unset. An element that already holds a different index keeps it;
/// the conflict is recorded and `extract` returns `false`.
pub struct SubsetIndexPolicy<'a> {
    subsets: &'a mut SubsetMap,
    kind: ElementKind,
    global_ids: Option<&'a GlobalIdRegistry>,
    conflicts: Vec<SubsetConflict>,
}

impl<'a> SubsetIndexPolicy<'a> {
    pub fn new(subsets: &'a mut SubsetMap, kind: ElementKind) -> Self {
        Self {
            subsets,
            kind,
            global_ids: None,
            conflicts: Vec::new(),
        }
    }

    /// Attach global ids to recorded conflicts.
    pub fn with_global_ids(mut self, registry: &'a GlobalIdRegistry) -> Self {
        self.global_ids = Some(registry);
        self
    }

    pub fn conflicts(&self) -> &[SubsetConflict] {
        &self.conflicts
    }

    pub fn take_conflicts(&mut self) -> Vec<SubsetConflict> {
        std::mem::take(&mut self.conflicts)
    }
}

impl CommunicationPolicy<ElementId> for SubsetIndexPolicy<'_> {
    fn required_buffer_size(&self, interface: &Interface<ElementId>) -> BufferSize {
        BufferSize::Exact(interface.len() * size_of::<i32>())
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<ElementId>) -> bool {
        for &e in interface {
            buf.put_i32_le(self.subsets.get(self.kind, e).unwrap_or(UNSET));
        }
        true
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<ElementId>) -> bool {
        let mut ok = true;
        for &e in interface {
            if buf.remaining() < size_of::<i32>() {
                return false;
            }
            let received = buf.get_i32_le();
            if received < 0 {
                continue;
            }
            match self.subsets.get(self.kind, e) {
                None => {
                    self.subsets.set(self.kind, e, received);
                }
                Some(local) if local == received => {}
                Some(local) => {
                    let global_id = self.global_ids.and_then(|r| r.global_id(self.kind, e));
                    log::warn!(
                        "subset conflict on {} {e} (global id {}) from rank {}: kept {local}, refused {received}",
                        self.kind,
                        global_id.map_or_else(|| "n/a".to_string(), |g| g.to_string()),
                        interface.partner(),
                    );
                    self.conflicts.push(SubsetConflict {
                        partner: interface.partner(),
                        kind: self.kind,
                        element: e,
                        global_id,
                        local,
                        received,
                    });
                    ok = false;
                }
            }
        }
        ok
    }
}

/// Exchanges selection flags; received flags are OR-ed into local flags.
pub struct SelectionFlagPolicy<'a> {
    selection: &'a mut SelectionMap,
    kind: ElementKind,
}

impl<'a> SelectionFlagPolicy<'a> {
    pub fn new(selection: &'a mut SelectionMap, kind: ElementKind) -> Self {
        Self { selection, kind }
    }
}

impl CommunicationPolicy<ElementId> for SelectionFlagPolicy<'_> {
    fn required_buffer_size(&self, interface: &Interface<ElementId>) -> BufferSize {
        BufferSize::Exact(interface.len())
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<ElementId>) -> bool {
        for &e in interface {
            buf.put_u8(self.selection.flags(self.kind, e));
        }
        true
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<ElementId>) -> bool {
        for &e in interface {
            if !buf.has_remaining() {
                return false;
            }
            self.selection.merge(self.kind, e, buf.get_u8());
        }
        true
    }
}
