//! LayoutMap: key → [`Layout`], one map per element kind.
//!
//! A distributed grid keeps one `LayoutMap` for its lifetime. Keys usually
//! combine a role with a grid level ([`LevelKey`]). Layouts are created on
//! first reference. The map is a weak index into the mesh: it never owns,
//! creates or deletes mesh elements.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use crate::debug_invariants::DebugInvariants;
use crate::layout::interface::InterfaceRole;
use crate::layout::layout::Layout;
use crate::layout_error::LayoutError;
use crate::topology::element::{ElementKind, KindMap};

/// Key type of a [`LayoutMap`]. The key decides the role of the layout it names.
pub trait LayoutKey: Ord + Clone + fmt::Debug {
    fn role(&self) -> InterfaceRole;
}

impl LayoutKey for InterfaceRole {
    fn role(&self) -> InterfaceRole {
        *self
    }
}

/// Role plus grid level.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct LevelKey {
    pub role: InterfaceRole,
    pub level: usize,
}

impl LevelKey {
    pub const fn master(level: usize) -> Self {
        Self {
            role: InterfaceRole::Master,
            level,
        }
    }

    pub const fn slave(level: usize) -> Self {
        Self {
            role: InterfaceRole::Slave,
            level,
        }
    }
}

impl LayoutKey for LevelKey {
    fn role(&self) -> InterfaceRole {
        self.role
    }
}

/// Layouts of all element kinds, keyed by `K`.
#[derive(Clone, Debug)]
pub struct LayoutMap<K, E> {
    maps: KindMap<BTreeMap<K, Layout<E>>>,
}

impl<K: LayoutKey, E> Default for LayoutMap<K, E> {
    fn default() -> Self {
        Self {
            maps: KindMap::from_fn(|_| BTreeMap::new()),
        }
    }
}

impl<K: LayoutKey, E> LayoutMap<K, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_layout(&self, kind: ElementKind, key: &K) -> bool {
        self.maps[kind].contains_key(key)
    }

    /// Layout under `key`, created empty on first reference.
    pub fn get_layout(&mut self, kind: ElementKind, key: K) -> &mut Layout<E> {
        let role = key.role();
        self.maps[kind]
            .entry(key)
            .or_insert_with(|| Layout::new(role))
    }

    pub fn layout(&self, kind: ElementKind, key: &K) -> Option<&Layout<E>> {
        self.maps[kind].get(key)
    }

    /// Layout under `key` without implicit creation.
    pub fn try_layout(&self, kind: ElementKind, key: &K) -> Result<&Layout<E>, LayoutError> {
        self.maps[kind]
            .get(key)
            .ok_or_else(|| LayoutError::MissingLayout {
                kind,
                key: format!("{key:?}"),
            })
    }

    /// Mutable variant of [`LayoutMap::try_layout`].
    pub fn try_layout_mut(
        &mut self,
        kind: ElementKind,
        key: &K,
    ) -> Result<&mut Layout<E>, LayoutError> {
        self.maps[kind]
            .get_mut(key)
            .ok_or_else(|| LayoutError::MissingLayout {
                kind,
                key: format!("{key:?}"),
            })
    }

    /// Remove the layout under `key`. Absent keys are a no-op.
    pub fn erase_layout(&mut self, kind: ElementKind, key: &K) -> Option<Layout<E>> {
        self.maps[kind].remove(key)
    }

    /// Remove the layout under `key` and return the key that follows it.
    ///
    /// Lets callers walk the keys and drop layouts on the way:
    ///
    /// ```
    /// # use mesh_layouts::layout::{LayoutMap, LevelKey};
    /// # use mesh_layouts::topology::element::ElementKind;
    /// let mut map = LayoutMap::<LevelKey, usize>::new();
    /// for level in 0..4 {
    ///     map.get_layout(ElementKind::Vertex, LevelKey::master(level));
    /// }
    /// let mut cur = map.first_key(ElementKind::Vertex);
    /// while let Some(key) = cur {
    ///     cur = if key.level % 2 == 0 {
    ///         map.erase_layout_and_advance(ElementKind::Vertex, &key)
    ///     } else {
    ///         map.next_key(ElementKind::Vertex, &key)
    ///     };
    /// }
    /// assert_eq!(map.num_layouts(ElementKind::Vertex), 2);
    /// ```
    pub fn erase_layout_and_advance(&mut self, kind: ElementKind, key: &K) -> Option<K> {
        let next = self.next_key(kind, key);
        self.maps[kind].remove(key);
        next
    }

    /// Smallest key of `kind`.
    pub fn first_key(&self, kind: ElementKind) -> Option<K> {
        self.maps[kind].keys().next().cloned()
    }

    /// Key strictly after `key`.
    pub fn next_key(&self, kind: ElementKind, key: &K) -> Option<K> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.maps[kind]
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    pub fn keys(&self, kind: ElementKind) -> impl Iterator<Item = &K> {
        self.maps[kind].keys()
    }

    pub fn layouts(&self, kind: ElementKind) -> impl Iterator<Item = (&K, &Layout<E>)> {
        self.maps[kind].iter()
    }

    pub fn layouts_mut(&mut self, kind: ElementKind) -> impl Iterator<Item = (&K, &mut Layout<E>)> {
        self.maps[kind].iter_mut()
    }

    pub fn num_layouts(&self, kind: ElementKind) -> usize {
        self.maps[kind].len()
    }

    /// Reset all four kinds to empty.
    pub fn clear(&mut self) {
        for (_, map) in self.maps.iter_mut() {
            map.clear();
        }
    }

    pub fn clear_kind(&mut self, kind: ElementKind) {
        self.maps[kind].clear();
    }

    /// Sweep all kinds and layouts, deleting interfaces without entries.
    ///
    /// Returns the number of interfaces removed. Idempotent.
    pub fn remove_empty_interfaces(&mut self) -> usize {
        let mut removed = 0;
        for (_, map) in self.maps.iter_mut() {
            for layout in map.values_mut() {
                removed += layout.remove_empty_interfaces();
            }
        }
        removed
    }

    /// Apply `f` to every layout of every kind.
    pub fn for_each_layout_mut(&mut self, mut f: impl FnMut(ElementKind, &K, &mut Layout<E>)) {
        for (kind, map) in self.maps.iter_mut() {
            for (key, layout) in map.iter_mut() {
                f(kind, key, layout);
            }
        }
    }
}

impl<K: LayoutKey, E: Eq + Hash + fmt::Debug> DebugInvariants for LayoutMap<K, E> {
    fn validate_invariants(&self) -> Result<(), LayoutError> {
        for (kind, map) in self.maps.iter() {
            for (key, layout) in map {
                if layout.role() != key.role() {
                    return Err(LayoutError::RoleMismatch {
                        kind,
                        key: format!("{key:?}"),
                        expected: key.role(),
                        found: layout.role(),
                    });
                }
                layout.validate_invariants()?;
            }
        }
        Ok(())
    }
}
