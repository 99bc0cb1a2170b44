//! GlobalLayout: partner rank → ordered global ids.
//!
//! A global layout is the process-independent form of a [`Layout`]. It is
//! built before a redistribution, shipped to the ranks that will own the
//! elements afterwards, merged, and turned back into a local layout once
//! the new local handles exist.
//!
//! Wire format (little-endian):
//!
//! ```text
//! count:u64
//! count × { partner:i32, n:u64, n × { owner:i32, local_seq:u64 } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::algs::wire::{GLOBAL_ID_BYTES, put_global_id, rank_to_wire, take_global_id};
use crate::layout::interface::InterfaceRole;
use crate::layout::layout::Layout;
use crate::layout_error::LayoutError;
use crate::topology::element::ElementKind;
use crate::topology::global_id::{GlobalId, GlobalIdLookup};

/// Partner rank → global ids exchanged with that partner, in wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLayout {
    interfaces: BTreeMap<usize, Vec<GlobalId>>,
}

impl GlobalLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry list for `partner`, created empty if missing.
    pub fn interface_mut(&mut self, partner: usize) -> &mut Vec<GlobalId> {
        self.interfaces.entry(partner).or_default()
    }

    pub fn get(&self, partner: usize) -> Option<&[GlobalId]> {
        self.interfaces.get(&partner).map(Vec::as_slice)
    }

    pub fn remove(&mut self, partner: usize) -> Option<Vec<GlobalId>> {
        self.interfaces.remove(&partner)
    }

    pub fn contains_partner(&self, partner: usize) -> bool {
        self.interfaces.contains_key(&partner)
    }

    pub fn partners(&self) -> impl Iterator<Item = usize> + '_ {
        self.interfaces.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[GlobalId])> {
        self.interfaces.iter().map(|(&p, ids)| (p, ids.as_slice()))
    }

    /// Number of partners.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Total number of entries over all partners.
    pub fn num_entries(&self) -> usize {
        self.interfaces.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }
}

impl fmt::Display for GlobalLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (partner, ids) in &self.interfaces {
            write!(f, "  to {partner} ({}):", ids.len())?;
            for id in ids {
                write!(f, " {id}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn put_rank<B: BufMut>(out: &mut B, rank: usize) {
    out.put_i32_le(rank_to_wire(rank));
}

/// Write `layout` in the wire format.
pub fn serialize_global_layout<B: BufMut>(out: &mut B, layout: &GlobalLayout) {
    out.put_u64_le(layout.len() as u64);
    for (partner, ids) in layout.iter() {
        put_rank(out, partner);
        out.put_u64_le(ids.len() as u64);
        for &id in ids {
            put_global_id(out, id);
        }
    }
}

fn take_u64<B: Buf>(buf: &mut B, source: usize, what: &str) -> Result<u64, LayoutError> {
    if buf.remaining() < 8 {
        return Err(LayoutError::MalformedMessage {
            neighbor: source,
            reason: format!("truncated {what}"),
        });
    }
    Ok(buf.get_u64_le())
}

/// Read one global layout from `buf` and append it to `layout`.
///
/// Entries for partners already present are appended after the existing
/// ones, so data from several senders accumulates. `source` is the rank the
/// bytes came from and only serves error reporting.
pub fn deserialize_and_add_global_layout<B: Buf>(
    buf: &mut B,
    layout: &mut GlobalLayout,
    source: usize,
) -> Result<(), LayoutError> {
    let count = take_u64(buf, source, "interface count")?;
    for _ in 0..count {
        if buf.remaining() < 4 {
            return Err(LayoutError::MalformedMessage {
                neighbor: source,
                reason: "truncated partner id".into(),
            });
        }
        let partner = buf.get_i32_le();
        if partner < 0 {
            return Err(LayoutError::MalformedMessage {
                neighbor: source,
                reason: format!("negative partner id {partner}"),
            });
        }
        let n = take_u64(buf, source, "entry count")? as usize;
        if n > buf.remaining() / GLOBAL_ID_BYTES {
            return Err(LayoutError::MalformedMessage {
                neighbor: source,
                reason: format!("{n} global ids announced, {} bytes left", buf.remaining()),
            });
        }
        let ids = layout.interface_mut(partner as usize);
        ids.reserve(n);
        for _ in 0..n {
            ids.push(take_global_id(buf, source)?);
        }
    }
    Ok(())
}

/// Apply a process rename to `layout`.
///
/// For each `(old, new)` in order: `old` is removed, then, if
/// `new != my_rank`, its entries are appended to those of `new`. An
/// identity rename `(a, a)` thus puts `a`'s entries back unchanged. Finally
/// any entry under `my_rank` is dropped, a rank never holds an interface to
/// itself. Entries are not deduplicated.
pub fn merge_global_layout(layout: &mut GlobalLayout, rename: &[(usize, usize)], my_rank: usize) {
    for &(old, new) in rename {
        let moved = layout.remove(old).unwrap_or_default();
        if new != my_rank {
            layout.interface_mut(new).extend(moved);
        }
    }
    layout.remove(my_rank);
}

/// Translate a local layout into global ids.
///
/// Fails with [`LayoutError::MissingGlobalId`] for an element without id.
pub fn create_global_layout<E, L>(
    layout: &Layout<E>,
    kind: ElementKind,
    lookup: &L,
) -> Result<GlobalLayout, LayoutError>
where
    E: fmt::Debug,
    L: GlobalIdLookup<E> + ?Sized,
{
    let mut out = GlobalLayout::new();
    for (partner, interface) in layout.iter() {
        let ids = out.interface_mut(partner);
        ids.reserve(interface.len());
        for e in interface {
            let id = lookup.global_id(e).ok_or_else(|| LayoutError::MissingGlobalId {
                kind,
                element: format!("{e:?}"),
            })?;
            ids.push(id);
        }
    }
    Ok(out)
}

/// Build a local layout of `role` from global ids.
///
/// Strict: a global id without local element fails with
/// [`LayoutError::UnknownGlobalId`]. Interface order is the global order.
pub fn build_layout_from_global_layout<E, L>(
    global: &GlobalLayout,
    role: InterfaceRole,
    lookup: &L,
) -> Result<Layout<E>, LayoutError>
where
    L: GlobalIdLookup<E> + ?Sized,
{
    let mut layout = Layout::new(role);
    for (partner, ids) in global.iter() {
        let interface = layout.interface(partner);
        for id in ids {
            let e = lookup
                .local_element(id)
                .ok_or(LayoutError::UnknownGlobalId { id: *id })?;
            interface.push(e);
        }
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::global_id::IndexGlobalIds;
    use bytes::BytesMut;

    fn gl(entries: &[(usize, &[(usize, u64)])]) -> GlobalLayout {
        let mut g = GlobalLayout::new();
        for &(p, ids) in entries {
            g.interface_mut(p)
                .extend(ids.iter().map(|&(o, s)| GlobalId::new(o, s)));
        }
        g
    }

    #[test]
    fn wire_layout_is_exact() {
        let g = gl(&[(2, &[(0, 7)])]);
        let mut out = BytesMut::new();
        serialize_global_layout(&mut out, &g);
        let mut expect = Vec::new();
        expect.extend_from_slice(&1u64.to_le_bytes());
        expect.extend_from_slice(&2i32.to_le_bytes());
        expect.extend_from_slice(&1u64.to_le_bytes());
        expect.extend_from_slice(&0i32.to_le_bytes());
        expect.extend_from_slice(&7u64.to_le_bytes());
        assert_eq!(&out[..], &expect[..]);
    }

    #[test]
    fn deserialize_appends() {
        let a = gl(&[(1, &[(0, 1), (0, 2)])]);
        let b = gl(&[(1, &[(1, 5)]), (3, &[(3, 3)])]);
        let mut target = GlobalLayout::new();
        for src in [&a, &b] {
            let mut out = BytesMut::new();
            serialize_global_layout(&mut out, src);
            deserialize_and_add_global_layout(&mut out.freeze(), &mut target, 0).unwrap();
        }
        assert_eq!(
            target,
            gl(&[(1, &[(0, 1), (0, 2), (1, 5)]), (3, &[(3, 3)])])
        );
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let g = gl(&[(1, &[(0, 1), (0, 2)])]);
        let mut out = BytesMut::new();
        serialize_global_layout(&mut out, &g);
        let short = out.freeze().slice(..30);
        let mut target = GlobalLayout::new();
        assert!(matches!(
            deserialize_and_add_global_layout(&mut short.clone(), &mut target, 4),
            Err(LayoutError::MalformedMessage { neighbor: 4, .. })
        ));
    }

    #[test]
    fn merge_moves_and_drops_self() {
        let mut g = gl(&[(1, &[(1, 1)]), (2, &[(2, 1)]), (5, &[(5, 1)])]);
        merge_global_layout(&mut g, &[(1, 2), (5, 0)], 0);
        assert!(!g.contains_partner(1));
        assert!(!g.contains_partner(5));
        assert!(!g.contains_partner(0));
        assert_eq!(g.get(2).unwrap(), &[GlobalId::new(2, 1), GlobalId::new(1, 1)]);
    }

    #[test]
    fn merge_keeps_duplicates() {
        let mut g = gl(&[(1, &[(0, 4)]), (2, &[(0, 4)])]);
        merge_global_layout(&mut g, &[(1, 2)], 0);
        assert_eq!(g.get(2).unwrap(), &[GlobalId::new(0, 4), GlobalId::new(0, 4)]);
    }

    #[test]
    fn identity_rename_keeps_entries_unless_self() {
        let mut g = gl(&[(2, &[(2, 1), (2, 3)][..]), (4, &[(4, 0)][..])]);
        merge_global_layout(&mut g, &[(2, 2)], 0);
        assert_eq!(g.get(2).unwrap(), &[GlobalId::new(2, 1), GlobalId::new(2, 3)]);
        assert_eq!(g.num_entries(), 3);

        merge_global_layout(&mut g, &[(4, 4)], 4);
        assert!(!g.contains_partner(4));
        assert_eq!(g.partners().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn local_global_roundtrip() {
        let ids = IndexGlobalIds::new(vec![GlobalId::new(0, 10), GlobalId::new(0, 11)]);
        let mut layout = Layout::new(InterfaceRole::Master);
        layout.interface(1).push(1usize);
        layout.interface(1).push(0usize);
        let g = create_global_layout(&layout, ElementKind::Vertex, &ids).unwrap();
        assert_eq!(g.get(1).unwrap(), &[GlobalId::new(0, 11), GlobalId::new(0, 10)]);
        let back: Layout<usize> = build_layout_from_global_layout(&g, InterfaceRole::Master, &ids).unwrap();
        assert_eq!(back, layout);

        layout.interface(1).push(9);
        assert!(matches!(
            create_global_layout(&layout, ElementKind::Vertex, &ids),
            Err(LayoutError::MissingGlobalId { kind: ElementKind::Vertex, .. })
        ));
        let bad = gl(&[(1, &[(3, 3)])]);
        assert_eq!(
            build_layout_from_global_layout::<usize, _>(&bad, InterfaceRole::Slave, &ids).unwrap_err(),
            LayoutError::UnknownGlobalId { id: GlobalId::new(3, 3) }
        );
    }
}
