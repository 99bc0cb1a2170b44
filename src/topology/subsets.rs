//! Per-element marking state exchanged by communication policies.
//!
//! [`SubsetMap`] stores one subset index per element (unset until assigned).
//! [`SelectionMap`] stores selection flag bits per element.

use std::collections::HashMap;

use crate::topology::element::{ElementId, ElementKind, KindMap};

/// Subset index per element, grouped by element kind.
#[derive(Clone, Debug, Default)]
pub struct SubsetMap {
    subsets: KindMap<HashMap<ElementId, i32>>,
}

impl SubsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `subset` to `element`, returning the previous value.
    pub fn set(&mut self, kind: ElementKind, element: ElementId, subset: i32) -> Option<i32> {
        self.subsets[kind].insert(element, subset)
    }

    /// Subset index of `element`, `None` if unset.
    pub fn get(&self, kind: ElementKind, element: ElementId) -> Option<i32> {
        self.subsets[kind].get(&element).copied()
    }

    /// Clear the subset index of `element`.
    pub fn unset(&mut self, kind: ElementKind, element: ElementId) -> Option<i32> {
        self.subsets[kind].remove(&element)
    }

    /// All elements of `kind` in `subset`, sorted.
    pub fn elements_in(&self, kind: ElementKind, subset: i32) -> Vec<ElementId> {
        let mut out: Vec<_> = self.subsets[kind]
            .iter()
            .filter_map(|(&e, &s)| (s == subset).then_some(e))
            .collect();
        out.sort_unstable();
        out
    }

    /// Number of elements of `kind` with an assigned subset.
    pub fn num_assigned(&self, kind: ElementKind) -> usize {
        self.subsets[kind].len()
    }
}

/// Selection flags per element. Zero means "not selected".
#[derive(Clone, Debug, Default)]
pub struct SelectionMap {
    flags: KindMap<HashMap<ElementId, u8>>,
}

impl SelectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the flags of `element`.
    pub fn select(&mut self, kind: ElementKind, element: ElementId, flags: u8) {
        if flags == 0 {
            self.flags[kind].remove(&element);
        } else {
            self.flags[kind].insert(element, flags);
        }
    }

    /// OR `flags` into the current flags of `element`.
    pub fn merge(&mut self, kind: ElementKind, element: ElementId, flags: u8) {
        if flags != 0 {
            *self.flags[kind].entry(element).or_insert(0) |= flags;
        }
    }

    pub fn deselect(&mut self, kind: ElementKind, element: ElementId) {
        self.flags[kind].remove(&element);
    }

    /// Flags of `element` (0 if unselected).
    pub fn flags(&self, kind: ElementKind, element: ElementId) -> u8 {
        self.flags[kind].get(&element).copied().unwrap_or(0)
    }

    pub fn is_selected(&self, kind: ElementKind, element: ElementId) -> bool {
        self.flags(kind, element) != 0
    }

    pub fn num_selected(&self, kind: ElementKind) -> usize {
        self.flags[kind].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_set_get_unset() {
        let mut s = SubsetMap::new();
        let e = ElementId::new(3);
        assert_eq!(s.get(ElementKind::Edge, e), None);
        assert_eq!(s.set(ElementKind::Edge, e, 4), None);
        assert_eq!(s.set(ElementKind::Edge, e, 5), Some(4));
        assert_eq!(s.get(ElementKind::Vertex, e), None);
        assert_eq!(s.elements_in(ElementKind::Edge, 5), vec![e]);
        assert_eq!(s.unset(ElementKind::Edge, e), Some(5));
        assert_eq!(s.num_assigned(ElementKind::Edge), 0);
    }

    #[test]
    fn selection_merge_ors_bits() {
        let mut sel = SelectionMap::new();
        let e = ElementId::new(1);
        sel.merge(ElementKind::Face, e, 0b01);
        sel.merge(ElementKind::Face, e, 0b10);
        assert_eq!(sel.flags(ElementKind::Face, e), 0b11);
        sel.select(ElementKind::Face, e, 0);
        assert!(!sel.is_selected(ElementKind::Face, e));
    }
}
