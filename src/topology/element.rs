//! Element handles and the element-kind tag.
//!
//! An [`ElementId`] is an opaque, process-local handle to a mesh entity. It
//! is never meaningful on another process; use a
//! [`GlobalId`](crate::topology::global_id::GlobalId) for that.
//!
//! [`KindMap`] stores one value per [`ElementKind`], replacing the four
//! hand-duplicated vertex/edge/face/volume containers a distributed grid
//! would otherwise need.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Kind of a mesh entity.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum ElementKind {
    Vertex,
    Edge,
    Face,
    Volume,
}

impl ElementKind {
    /// All kinds in ascending dimension.
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Vertex,
        ElementKind::Edge,
        ElementKind::Face,
        ElementKind::Volume,
    ];

    /// Topological dimension of the kind.
    #[inline]
    pub const fn dim(self) -> usize {
        match self {
            ElementKind::Vertex => 0,
            ElementKind::Edge => 1,
            ElementKind::Face => 2,
            ElementKind::Volume => 3,
        }
    }

    /// Kind of the given dimension, if any.
    pub const fn from_dim(dim: usize) -> Option<Self> {
        match dim {
            0 => Some(ElementKind::Vertex),
            1 => Some(ElementKind::Edge),
            2 => Some(ElementKind::Face),
            3 => Some(ElementKind::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
            ElementKind::Face => "face",
            ElementKind::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// Process-local handle to a mesh entity.
///
/// Handles are cheap to copy and compare. They are valid only inside the
/// mesh that issued them and must not be dereferenced after the element
/// was erased.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct ElementId(u64);

impl ElementId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        ElementId(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementId").field(&self.0).finish()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `T` per element kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindMap<T> {
    slots: [T; 4],
}

impl<T> KindMap<T> {
    /// Build a map by evaluating `f` once per kind.
    pub fn from_fn(mut f: impl FnMut(ElementKind) -> T) -> Self {
        Self {
            slots: ElementKind::ALL.map(&mut f),
        }
    }

    /// Iterate `(kind, value)` pairs in ascending dimension.
    pub fn iter(&self) -> impl Iterator<Item = (ElementKind, &T)> {
        ElementKind::ALL.into_iter().zip(self.slots.iter())
    }

    /// Mutable variant of [`KindMap::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ElementKind, &mut T)> {
        ElementKind::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T> Index<ElementKind> for KindMap<T> {
    type Output = T;

    #[inline]
    fn index(&self, kind: ElementKind) -> &T {
        &self.slots[kind.dim()]
    }
}

impl<T> IndexMut<ElementKind> for KindMap<T> {
    #[inline]
    fn index_mut(&mut self, kind: ElementKind) -> &mut T {
        &mut self.slots[kind.dim()]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_dim_roundtrip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_dim(kind.dim()), Some(kind));
        }
        assert_eq!(ElementKind::from_dim(4), None);
    }

    #[test]
    fn kind_map_indexes_by_kind() {
        let mut m = KindMap::from_fn(|k| k.dim() * 10);
        assert_eq!(m[ElementKind::Face], 20);
        m[ElementKind::Edge] += 1;
        let collected: Vec<_> = m.iter().map(|(_, v)| *v).collect();
        assert_eq!(collected, vec![0, 11, 20, 30]);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(ElementKind::Volume.to_string(), "volume");
        assert_eq!(ElementId::new(7).to_string(), "7");
    }
}
