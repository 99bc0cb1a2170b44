//! Maintenance passes that keep layouts in step with the mesh.
//!
//! Layouts hold non-owning handles. When elements are erased the handles
//! must be removed before the next exchange; nothing here happens
//! implicitly. [`ErasedElementTracker`] listens to grid messages and
//! remembers erased handles until [`ErasedElementTracker::prune`] runs.

use std::cell::RefCell;
use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

use crate::layout::layout::Layout;
use crate::layout::layout_map::{LayoutKey, LayoutMap};
use crate::topology::element::{ElementId, ElementKind, KindMap};
use crate::topology::grid::{GridAccess, GridMessage, InMemoryGrid};
use crate::topology::hub::Subscription;

/// Erase every entry contained in `elements` from all interfaces of `layout`.
///
/// Returns the number of erased entries. Empty interfaces stay in place.
pub fn remove_elements_from_layout<E>(layout: &mut Layout<E>, elements: &HashSet<E>) -> usize
where
    E: Eq + Hash,
{
    if elements.is_empty() {
        return 0;
    }
    layout
        .iter_mut()
        .map(|(_, iface)| iface.retain(|e| !elements.contains(e)))
        .sum()
}

/// [`remove_elements_from_layout`] over every layout of `kind`.
pub fn remove_elements_from_layouts<K, E>(
    layouts: &mut LayoutMap<K, E>,
    kind: ElementKind,
    elements: &HashSet<E>,
) -> usize
where
    K: LayoutKey,
    E: Eq + Hash,
{
    layouts
        .layouts_mut(kind)
        .map(|(_, layout)| remove_elements_from_layout(layout, elements))
        .sum()
}

/// Erase entries whose element no longer exists in `grid`.
pub fn prune_missing_elements<K, G>(
    layouts: &mut LayoutMap<K, ElementId>,
    grid: &G,
) -> usize
where
    K: LayoutKey,
    G: GridAccess + ?Sized,
{
    let mut removed = 0;
    layouts.for_each_layout_mut(|kind, _, layout| {
        for (_, iface) in layout.iter_mut() {
            removed += iface.retain(|&e| grid.contains(kind, e));
        }
    });
    if removed > 0 {
        log::debug!("pruned {removed} stale interface entries");
    }
    removed
}

/// Collects erased elements announced by an [`InMemoryGrid`].
pub struct ErasedElementTracker {
    erased: Rc<RefCell<KindMap<HashSet<ElementId>>>>,
    _subscription: Subscription<GridMessage>,
}

impl ErasedElementTracker {
    /// Start listening to `grid`.
    pub fn attach(grid: &InMemoryGrid) -> Self {
        let erased: Rc<RefCell<KindMap<HashSet<ElementId>>>> = Rc::default();
        let sink = Rc::clone(&erased);
        let subscription = grid.subscribe(move |msg| {
            if let GridMessage::ElementsErased { kind, elements } = msg {
                sink.borrow_mut()[*kind].extend(elements.iter().copied());
            }
        });
        Self {
            erased,
            _subscription: subscription,
        }
    }

    /// Number of erased elements not yet pruned.
    pub fn pending(&self) -> usize {
        self.erased.borrow().iter().map(|(_, s)| s.len()).sum()
    }

    /// Remove all recorded elements from `layouts` and forget them.
    pub fn prune<K: LayoutKey>(&self, layouts: &mut LayoutMap<K, ElementId>) -> usize {
        let erased = std::mem::take(&mut *self.erased.borrow_mut());
        erased
            .iter()
            .map(|(kind, set)| remove_elements_from_layouts(layouts, kind, set))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::interface::InterfaceRole;
    use crate::layout::layout_map::LevelKey;

    #[test]
    fn remove_elements_keeps_order() {
        let mut l = Layout::new(InterfaceRole::Master);
        for e in [1u32, 2, 3, 4] {
            l.interface(7).push(e);
        }
        let gone: HashSet<u32> = [2, 4].into_iter().collect();
        assert_eq!(remove_elements_from_layout(&mut l, &gone), 2);
        assert_eq!(l.get(7).unwrap().to_vec(), vec![1, 3]);
    }

    #[test]
    fn tracker_prunes_erased_vertices() {
        let mut grid = InMemoryGrid::new();
        let v: Vec<_> = (0..3).map(|_| grid.add_vertex()).collect();
        let mut layouts = LayoutMap::<LevelKey, ElementId>::new();
        let l = layouts.get_layout(ElementKind::Vertex, LevelKey::master(0));
        for &x in &v {
            l.interface(1).push(x);
        }
        let tracker = ErasedElementTracker::attach(&grid);
        grid.erase(ElementKind::Vertex, &[v[1]]);
        assert_eq!(tracker.pending(), 1);
        assert_eq!(tracker.prune(&mut layouts), 1);
        assert_eq!(tracker.pending(), 0);
        let l = layouts.layout(ElementKind::Vertex, &LevelKey::master(0)).unwrap();
        assert_eq!(l.get(1).unwrap().to_vec(), vec![v[0], v[2]]);
    }

    #[test]
    fn prune_missing_uses_grid_existence() {
        let mut grid = InMemoryGrid::new();
        let a = grid.add_vertex();
        let mut layouts = LayoutMap::<LevelKey, ElementId>::new();
        let l = layouts.get_layout(ElementKind::Vertex, LevelKey::slave(0));
        l.interface(0).push(a);
        l.interface(0).push(ElementId::new(77));
        assert_eq!(prune_missing_elements(&mut layouts, &grid), 1);
        assert_eq!(prune_missing_elements(&mut layouts, &grid), 0);
    }
}
