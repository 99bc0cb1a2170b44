//! Derive edge, face and volume interfaces from a vertex layout.
//!
//! An element is shared with a partner when all of its corner vertices are
//! in the vertex interface to that partner. It inherits the role of the
//! vertex layout. Derived interfaces are ordered by element global id, which
//! both sides agree on, so no extra round is needed to align them.

use std::collections::{BTreeSet, HashSet};

use crate::debug_invariants::DebugInvariants;
use crate::layout::layout::Layout;
use crate::layout::layout_map::{LayoutKey, LayoutMap};
use crate::layout_error::LayoutError;
use crate::topology::element::{ElementId, ElementKind};
use crate::topology::global_id::{GlobalId, GlobalIdRegistry};
use crate::topology::grid::{GridAccess, ensure_interconnection_tracking};

/// Interfaces of kind `to` implied by `vertex_layout`.
///
/// Enables interconnection tracking on `grid` (with a warning) if needed.
/// Fails with [`LayoutError::MissingGlobalId`] for a shared element that
/// has no global id.
pub fn derive_interfaces<G>(
    grid: &mut G,
    vertex_layout: &Layout<ElementId>,
    to: ElementKind,
    registry: &GlobalIdRegistry,
) -> Result<Layout<ElementId>, LayoutError>
where
    G: GridAccess + ?Sized,
{
    if to == ElementKind::Vertex {
        return Ok(vertex_layout.clone());
    }
    ensure_interconnection_tracking(grid);

    let mut derived = Layout::new(vertex_layout.role());
    for (partner, vertices) in vertex_layout.iter() {
        let shared: HashSet<ElementId> = vertices.iter().copied().collect();
        let mut candidates: BTreeSet<ElementId> = BTreeSet::new();
        for &v in &shared {
            candidates.extend(grid.elements_around_vertex(v, to)?);
        }

        let mut keyed: Vec<(GlobalId, ElementId)> = Vec::new();
        for e in candidates {
            let Some(corners) = grid.vertices_of(to, e) else {
                continue;
            };
            if !corners.iter().all(|c| shared.contains(c)) {
                continue;
            }
            let id = registry
                .global_id(to, e)
                .ok_or_else(|| LayoutError::MissingGlobalId {
                    kind: to,
                    element: e.to_string(),
                })?;
            keyed.push((id, e));
        }
        keyed.sort_unstable();

        if !keyed.is_empty() {
            let interface = derived.interface(partner);
            for (_, e) in keyed {
                interface.push(e);
            }
        }
    }
    derived.debug_assert_invariants();
    log::debug!(
        "derived {} {to} interface entries over {} partner(s)",
        derived.num_elements(),
        derived.num_interfaces()
    );
    Ok(derived)
}

/// Rebuild the edge, face and volume layouts under `key` from its vertex layout.
///
/// Existing layouts of those kinds under `key` are replaced. Missing vertex
/// layout is a [`LayoutError::MissingLayout`].
pub fn derive_layouts<K, G>(
    grid: &mut G,
    layouts: &mut LayoutMap<K, ElementId>,
    key: &K,
    registry: &GlobalIdRegistry,
) -> Result<(), LayoutError>
where
    K: LayoutKey,
    G: GridAccess + ?Sized,
{
    let vertex_layout = layouts.try_layout(ElementKind::Vertex, key)?.clone();
    for to in [ElementKind::Edge, ElementKind::Face, ElementKind::Volume] {
        let derived = derive_interfaces(grid, &vertex_layout, to, registry)?;
        *layouts.get_layout(to, key.clone()) = derived;
    }
    Ok(())
}
