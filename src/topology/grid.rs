//! Mesh access consumed by the layout subsystem.
//!
//! The subsystem never owns the mesh. It needs element enumeration,
//! existence queries and, for interface derivation, vertex-to-element
//! adjacency. Adjacency is only available once the mesh tracks
//! interconnections. [`ensure_interconnection_tracking`] switches tracking
//! on when it is missing and logs a warning.
//!
//! [`InMemoryGrid`] is a small reference mesh used by tests and demos.

use std::collections::{BTreeMap, HashMap};

use crate::layout_error::LayoutError;
use crate::topology::element::{ElementId, ElementKind, KindMap};
use crate::topology::hub::{MessageHub, Subscription};

/// Structural changes announced by a grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridMessage {
    /// Elements were created.
    ElementsCreated {
        kind: ElementKind,
        elements: Vec<ElementId>,
    },
    /// Elements were erased; layouts still referencing them must be pruned.
    ElementsErased {
        kind: ElementKind,
        elements: Vec<ElementId>,
    },
}

/// Read access to a process-local mesh.
pub trait GridAccess {
    /// Does `element` of `kind` currently exist?
    fn contains(&self, kind: ElementKind, element: ElementId) -> bool;

    /// All elements of `kind`, in ascending handle order.
    fn elements(&self, kind: ElementKind) -> Vec<ElementId>;

    fn num_elements(&self, kind: ElementKind) -> usize {
        self.elements(kind).len()
    }

    /// Corner vertices of a non-vertex element.
    fn vertices_of(&self, kind: ElementKind, element: ElementId) -> Option<&[ElementId]>;

    /// Whether vertex-to-element adjacency is maintained.
    fn interconnection_tracking(&self) -> bool;

    /// Start maintaining vertex-to-element adjacency.
    fn enable_interconnection_tracking(&mut self);

    /// Elements of kind `to` incident to `vertex`.
    ///
    /// Fails with [`LayoutError::MissingCapability`] when tracking is off.
    fn elements_around_vertex(
        &self,
        vertex: ElementId,
        to: ElementKind,
    ) -> Result<Vec<ElementId>, LayoutError>;
}

/// Make sure `grid` tracks interconnections, enabling it if needed.
///
/// Returns `true` if tracking had to be switched on.
pub fn ensure_interconnection_tracking<G: GridAccess + ?Sized>(grid: &mut G) -> bool {
    if grid.interconnection_tracking() {
        return false;
    }
    log::warn!(
        "grid does not track element interconnections; enabling it now (adjacency queries require it)"
    );
    grid.enable_interconnection_tracking();
    true
}

/// Simple mesh storing each non-vertex element as its corner list.
#[derive(Debug, Default)]
pub struct InMemoryGrid {
    elements: KindMap<BTreeMap<ElementId, Vec<ElementId>>>,
    incidence: Option<KindMap<HashMap<ElementId, Vec<ElementId>>>>,
    next_id: u64,
    hub: MessageHub<GridMessage>,
}

impl InMemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grid that maintains adjacency from the start.
    pub fn with_interconnection_tracking() -> Self {
        let mut grid = Self::default();
        grid.enable_interconnection_tracking();
        grid
    }

    fn fresh_id(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId::new(self.next_id)
    }

    pub fn add_vertex(&mut self) -> ElementId {
        let v = self.fresh_id();
        self.elements[ElementKind::Vertex].insert(v, Vec::new());
        self.hub.post(&GridMessage::ElementsCreated {
            kind: ElementKind::Vertex,
            elements: vec![v],
        });
        v
    }

    /// Add an edge, face or volume spanned by existing vertices.
    pub fn add_element(
        &mut self,
        kind: ElementKind,
        corners: &[ElementId],
    ) -> Result<ElementId, LayoutError> {
        if kind == ElementKind::Vertex {
            return Ok(self.add_vertex());
        }
        if let Some(&missing) = corners
            .iter()
            .find(|v| !self.elements[ElementKind::Vertex].contains_key(v))
        {
            return Err(LayoutError::UnknownElement {
                kind: ElementKind::Vertex,
                element: missing.to_string(),
            });
        }
        let e = self.fresh_id();
        if let Some(incidence) = self.incidence.as_mut() {
            for &v in corners {
                incidence[kind].entry(v).or_default().push(e);
            }
        }
        self.elements[kind].insert(e, corners.to_vec());
        self.hub.post(&GridMessage::ElementsCreated {
            kind,
            elements: vec![e],
        });
        Ok(e)
    }

    /// Erase elements and notify subscribers.
    ///
    /// Unknown handles are ignored. Elements depending on an erased vertex
    /// are not erased automatically.
    pub fn erase(&mut self, kind: ElementKind, elements: &[ElementId]) {
        let mut erased = Vec::with_capacity(elements.len());
        for &e in elements {
            let Some(corners) = self.elements[kind].remove(&e) else {
                continue;
            };
            if let Some(incidence) = self.incidence.as_mut() {
                for v in corners {
                    if let Some(list) = incidence[kind].get_mut(&v) {
                        list.retain(|&x| x != e);
                    }
                }
                if kind == ElementKind::Vertex {
                    for (_, map) in incidence.iter_mut() {
                        map.remove(&e);
                    }
                }
            }
            erased.push(e);
        }
        if !erased.is_empty() {
            self.hub.post(&GridMessage::ElementsErased {
                kind,
                elements: erased,
            });
        }
    }

    /// Subscribe to structural change messages.
    pub fn subscribe(&self, callback: impl FnMut(&GridMessage) + 'static) -> Subscription<GridMessage> {
        self.hub.subscribe(callback)
    }
}

impl GridAccess for InMemoryGrid {
    fn contains(&self, kind: ElementKind, element: ElementId) -> bool {
        self.elements[kind].contains_key(&element)
    }

    fn elements(&self, kind: ElementKind) -> Vec<ElementId> {
        self.elements[kind].keys().copied().collect()
    }

    fn num_elements(&self, kind: ElementKind) -> usize {
        self.elements[kind].len()
    }

    fn vertices_of(&self, kind: ElementKind, element: ElementId) -> Option<&[ElementId]> {
        self.elements[kind].get(&element).map(Vec::as_slice)
    }

    fn interconnection_tracking(&self) -> bool {
        self.incidence.is_some()
    }

    fn enable_interconnection_tracking(&mut self) {
        if self.incidence.is_some() {
            return;
        }
        let mut incidence: KindMap<HashMap<ElementId, Vec<ElementId>>> = KindMap::default();
        for (kind, map) in self.elements.iter() {
            for (&e, corners) in map {
                for &v in corners {
                    incidence[kind].entry(v).or_default().push(e);
                }
            }
        }
        self.incidence = Some(incidence);
    }

    fn elements_around_vertex(
        &self,
        vertex: ElementId,
        to: ElementKind,
    ) -> Result<Vec<ElementId>, LayoutError> {
        let incidence = self
            .incidence
            .as_ref()
            .ok_or(LayoutError::MissingCapability("interconnection tracking"))?;
        if to == ElementKind::Vertex {
            return Ok(vec![vertex]);
        }
        Ok(incidence[to].get(&vertex).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn triangle() -> (InMemoryGrid, [ElementId; 3]) {
        let mut g = InMemoryGrid::new();
        let v = [g.add_vertex(), g.add_vertex(), g.add_vertex()];
        g.add_element(ElementKind::Edge, &[v[0], v[1]]).unwrap();
        g.add_element(ElementKind::Edge, &[v[1], v[2]]).unwrap();
        g.add_element(ElementKind::Face, &v).unwrap();
        (g, v)
    }

    #[test]
    fn adjacency_requires_tracking() {
        let (mut g, v) = triangle();
        let err = g.elements_around_vertex(v[1], ElementKind::Edge).unwrap_err();
        assert_eq!(err, LayoutError::MissingCapability("interconnection tracking"));
        assert!(ensure_interconnection_tracking(&mut g));
        assert!(!ensure_interconnection_tracking(&mut g));
        assert_eq!(g.elements_around_vertex(v[1], ElementKind::Edge).unwrap().len(), 2);
        assert_eq!(g.elements_around_vertex(v[0], ElementKind::Face).unwrap().len(), 1);
    }

    #[test]
    fn erase_posts_message() {
        let (mut g, v) = triangle();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = g.subscribe(move |m| sink.borrow_mut().push(m.clone()));
        g.erase(ElementKind::Vertex, &[v[2], ElementId::new(999)]);
        assert!(!g.contains(ElementKind::Vertex, v[2]));
        assert_eq!(
            *seen.borrow(),
            vec![GridMessage::ElementsErased {
                kind: ElementKind::Vertex,
                elements: vec![v[2]],
            }]
        );
    }

    #[test]
    fn add_element_rejects_unknown_corner() {
        let mut g = InMemoryGrid::new();
        let v = g.add_vertex();
        assert!(g
            .add_element(ElementKind::Edge, &[v, ElementId::new(42)])
            .is_err());
    }
}
