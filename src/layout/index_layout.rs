//! Index layouts and bulk index renumbering.
//!
//! An index layout is a [`Layout`] whose elements are dof indices into a
//! local vector. Whenever the local index space is renumbered (dof
//! compaction, reordering) every index layout has to be rewritten with
//! [`replace_indices_in_layout`] before the next exchange.

use crate::layout::interface::Interface;
use crate::layout::layout::Layout;
use crate::layout::layout_map::{LayoutKey, LayoutMap};
use crate::topology::element::ElementKind;

/// Layout over local dof indices.
pub type IndexLayout = Layout<usize>;
/// Interface over local dof indices.
pub type IndexInterface = Interface<usize>;

/// Old-index → new-index table. `None` marks a deleted index.
///
/// Implemented for signed integer slices, where a negative entry means
/// "deleted", and for `[Option<usize>]`.
pub trait IndexRemap {
    fn remap(&self, old: usize) -> Option<usize>;
}

macro_rules! impl_signed_remap {
    ($($t:ty),*) => {$(
        impl IndexRemap for [$t] {
            #[inline]
            fn remap(&self, old: usize) -> Option<usize> {
                match self.get(old) {
                    Some(&new) if new >= 0 => Some(new as usize),
                    _ => None,
                }
            }
        }
    )*};
}

impl_signed_remap!(i32, i64, isize);

impl IndexRemap for [Option<usize>] {
    #[inline]
    fn remap(&self, old: usize) -> Option<usize> {
        self.get(old).copied().flatten()
    }
}

impl<R: IndexRemap + ?Sized> IndexRemap for &R {
    #[inline]
    fn remap(&self, old: usize) -> Option<usize> {
        (**self).remap(old)
    }
}

impl<T> IndexRemap for Vec<T>
where
    [T]: IndexRemap,
{
    #[inline]
    fn remap(&self, old: usize) -> Option<usize> {
        self.as_slice().remap(old)
    }
}

/// Rewrite one interface in place. Returns the number of erased entries.
pub fn replace_indices_in_interface<R>(interface: &mut IndexInterface, map: &R) -> usize
where
    R: IndexRemap + ?Sized,
{
    let mut erased = 0;
    let mut cur = interface.first();
    while let Some(c) = cur {
        let new = interface.get_element(c).and_then(|&old| map.remap(old));
        match new {
            Some(new) => {
                if let Some(slot) = interface.get_element_mut(c) {
                    *slot = new;
                }
                cur = interface.next(c);
            }
            None => {
                cur = interface.erase(c);
                erased += 1;
            }
        }
    }
    erased
}

/// Rewrite every interface of `layout` through `map`.
///
/// Entries whose old index maps to a deleted marker (negative value, `None`,
/// or an index past the end of `map`) are erased; all others get their new
/// index. Interfaces left empty are kept until
/// [`Layout::remove_empty_interfaces`]. Returns the number of erased entries.
pub fn replace_indices_in_layout<R>(layout: &mut IndexLayout, map: &R) -> usize
where
    R: IndexRemap + ?Sized,
{
    let mut erased = 0;
    for (_, iface) in layout.iter_mut() {
        erased += replace_indices_in_interface(iface, map);
    }
    if erased > 0 {
        log::debug!(
            "index remap erased {erased} {} interface entries",
            layout.role()
        );
    }
    erased
}

/// Apply [`replace_indices_in_layout`] to every layout of `kind` in `map`.
pub fn replace_indices_in_layout_map<K, R>(
    layouts: &mut LayoutMap<K, usize>,
    kind: ElementKind,
    map: &R,
) -> usize
where
    K: LayoutKey,
    R: IndexRemap + ?Sized,
{
    layouts
        .layouts_mut(kind)
        .map(|(_, layout)| replace_indices_in_layout(layout, map))
        .sum()
}

/// Append `indices` to the interface to `partner`, in order.
pub fn add_entries_to_index_layout(
    layout: &mut IndexLayout,
    partner: usize,
    indices: impl IntoIterator<Item = usize>,
) {
    let iface = layout.interface(partner);
    for i in indices {
        iface.push(i);
    }
}

/// Largest index referenced by `layout`, if any.
pub fn max_index(layout: &IndexLayout) -> Option<usize> {
    layout
        .iter()
        .flat_map(|(_, iface)| iface.iter().copied())
        .max()
}
