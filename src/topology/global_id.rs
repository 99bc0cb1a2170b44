//! Process-independent element identity.
//!
//! A [`GlobalId`] is `(owner, local_seq)`: the rank that created the element
//! and a sequence number unique on that rank. It is the only identity that
//! is valid across process boundaries and it survives repartitioning.
//!
//! [`GlobalIdRegistry`] is the per-process table that hands out and resolves
//! global ids. It is an explicit object created once per distributed mesh
//! and passed by reference to whoever needs it.

use std::collections::HashMap;
use std::fmt;

use crate::layout_error::LayoutError;
use crate::topology::element::{ElementId, ElementKind, KindMap};

/// Globally unique identity of a mesh entity.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct GlobalId {
    /// Rank that created the element.
    pub owner: usize,
    /// Sequence number on the owning rank.
    pub local_seq: u64,
}

impl GlobalId {
    #[inline]
    pub const fn new(owner: usize, local_seq: u64) -> Self {
        Self { owner, local_seq }
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalId({}, {})", self.owner, self.local_seq)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.owner, self.local_seq)
    }
}

/// Two-way mapping between local elements of type `E` and global ids.
///
/// Used to turn a [`Layout`](crate::layout::Layout) into a
/// [`GlobalLayout`](crate::global::GlobalLayout) and back.
pub trait GlobalIdLookup<E> {
    /// Global id of a local element.
    fn global_id(&self, element: &E) -> Option<GlobalId>;
    /// Local element carrying `id`.
    fn local_element(&self, id: &GlobalId) -> Option<E>;
}

/// Per-process registry of global ids, one table per element kind.
#[derive(Clone, Debug)]
pub struct GlobalIdRegistry {
    rank: usize,
    next_seq: u64,
    by_element: KindMap<HashMap<ElementId, GlobalId>>,
    by_id: KindMap<HashMap<GlobalId, ElementId>>,
}

impl GlobalIdRegistry {
    /// Create an empty registry for `rank`.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            next_seq: 0,
            by_element: KindMap::default(),
            by_id: KindMap::default(),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Return the id of `element`, creating `(rank, next_seq)` if it has none.
    pub fn assign(&mut self, kind: ElementKind, element: ElementId) -> GlobalId {
        if let Some(&id) = self.by_element[kind].get(&element) {
            return id;
        }
        let id = GlobalId::new(self.rank, self.next_seq);
        self.next_seq += 1;
        self.by_element[kind].insert(element, id);
        self.by_id[kind].insert(id, element);
        id
    }

    /// Attach an id received from another process to a local element.
    ///
    /// Fails if `id` is already attached to a different element of the same
    /// kind. Re-adopting the same pair is a no-op.
    pub fn adopt(
        &mut self,
        kind: ElementKind,
        element: ElementId,
        id: GlobalId,
    ) -> Result<(), LayoutError> {
        match self.by_id[kind].get(&id) {
            Some(&other) if other != element => {
                return Err(LayoutError::DuplicateElement {
                    partner: id.owner,
                    element: format!("{kind} {element} (global id {id} held by {other})"),
                });
            }
            Some(_) => return Ok(()),
            None => {}
        }
        if let Some(old) = self.by_element[kind].insert(element, id) {
            self.by_id[kind].remove(&old);
        }
        self.by_id[kind].insert(id, element);
        if id.owner == self.rank && id.local_seq >= self.next_seq {
            self.next_seq = id.local_seq + 1;
        }
        Ok(())
    }

    /// Global id of `element`, if registered.
    pub fn global_id(&self, kind: ElementKind, element: ElementId) -> Option<GlobalId> {
        self.by_element[kind].get(&element).copied()
    }

    /// Like [`GlobalIdRegistry::global_id`] but reports a missing id as an error.
    pub fn try_global_id(
        &self,
        kind: ElementKind,
        element: ElementId,
    ) -> Result<GlobalId, LayoutError> {
        self.global_id(kind, element)
            .ok_or_else(|| LayoutError::MissingGlobalId {
                kind,
                element: element.to_string(),
            })
    }

    /// Local element carrying `id`, if any.
    pub fn element(&self, kind: ElementKind, id: GlobalId) -> Option<ElementId> {
        self.by_id[kind].get(&id).copied()
    }

    /// Drop the entry of an erased element.
    pub fn forget(&mut self, kind: ElementKind, element: ElementId) -> Option<GlobalId> {
        let id = self.by_element[kind].remove(&element)?;
        self.by_id[kind].remove(&id);
        Some(id)
    }

    /// Number of registered elements of `kind`.
    pub fn len(&self, kind: ElementKind) -> usize {
        self.by_element[kind].len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_element.iter().all(|(_, m)| m.is_empty())
    }

    /// Lookup restricted to one element kind.
    pub fn view(&self, kind: ElementKind) -> RegistryView<'_> {
        RegistryView {
            registry: self,
            kind,
        }
    }
}

/// A [`GlobalIdRegistry`] restricted to one element kind.
#[derive(Clone, Copy, Debug)]
pub struct RegistryView<'a> {
    registry: &'a GlobalIdRegistry,
    kind: ElementKind,
}

impl RegistryView<'_> {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

impl GlobalIdLookup<ElementId> for RegistryView<'_> {
    fn global_id(&self, element: &ElementId) -> Option<GlobalId> {
        self.registry.global_id(self.kind, *element)
    }

    fn local_element(&self, id: &GlobalId) -> Option<ElementId> {
        self.registry.element(self.kind, *id)
    }
}

/// Global ids of dof indices: `ids[i]` is the id of local index `i`.
#[derive(Clone, Debug, Default)]
pub struct IndexGlobalIds {
    ids: Vec<GlobalId>,
    reverse: HashMap<GlobalId, usize>,
}

impl IndexGlobalIds {
    pub fn new(ids: Vec<GlobalId>) -> Self {
        let reverse = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self { ids, reverse }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl GlobalIdLookup<usize> for IndexGlobalIds {
    fn global_id(&self, element: &usize) -> Option<GlobalId> {
        self.ids.get(*element).copied()
    }

    fn local_element(&self, id: &GlobalId) -> Option<usize> {
        self.reverse.get(id).copied()
    }
}
