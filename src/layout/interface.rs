//! Interface: ordered elements shared with exactly one partner rank.
//!
//! Entries live in an index-stable doubly linked list. Erasing an entry never
//! moves other entries, so cursors to the remaining entries stay valid, and
//! the iteration order is always the insertion order. That order is the wire
//! order of every collect/extract pair.
//!
//! Cursors carry a generation: a cursor to an erased entry is rejected even
//! after its slot has been reused.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use crate::debug_invariants::DebugInvariants;
use crate::layout_error::LayoutError;

/// Role of the local process for the elements of an interface.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum InterfaceRole {
    Master,
    Slave,
}

impl InterfaceRole {
    /// Role the partner plays on its side of the same interface.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            InterfaceRole::Master => InterfaceRole::Slave,
            InterfaceRole::Slave => InterfaceRole::Master,
        }
    }
}

impl fmt::Display for InterfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterfaceRole::Master => "master",
            InterfaceRole::Slave => "slave",
        })
    }
}

/// Position of one entry inside an [`Interface`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceCursor {
    slot: usize,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Node<E> {
    element: E,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Clone, Debug)]
struct Slot<E> {
    generation: u32,
    node: Option<Node<E>>,
}

/// Ordered elements shared with one partner process.
#[derive(Clone, Debug)]
pub struct Interface<E> {
    partner: usize,
    role: InterfaceRole,
    slots: Vec<Slot<E>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<E> Interface<E> {
    /// Empty interface to `partner`.
    pub fn new(partner: usize, role: InterfaceRole) -> Self {
        Self {
            partner,
            role,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Interface to `partner` holding `elements` in the given order.
    pub fn from_elements<I>(partner: usize, role: InterfaceRole, elements: I) -> Self
    where
        I: IntoIterator<Item = E>,
    {
        let mut iface = Self::new(partner, role);
        for e in elements {
            iface.push(e);
        }
        iface
    }

    #[inline]
    pub fn partner(&self) -> usize {
        self.partner
    }

    #[inline]
    pub fn role(&self) -> InterfaceRole {
        self.role
    }

    /// Number of entries.
    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `element`. Duplicates are not detected; see [`Interface::try_push`].
    pub fn push(&mut self, element: E) -> InterfaceCursor {
        let node = Node {
            element,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].node = Some(node);
                slot
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };
        match self.tail {
            Some(t) => {
                if let Some(n) = self.slots[t].node.as_mut() {
                    n.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
        InterfaceCursor {
            slot,
            generation: self.slots[slot].generation,
        }
    }

    fn node(&self, cursor: InterfaceCursor) -> Option<&Node<E>> {
        let slot = self.slots.get(cursor.slot)?;
        if slot.generation != cursor.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn cursor_at(&self, slot: usize) -> InterfaceCursor {
        InterfaceCursor {
            slot,
            generation: self.slots[slot].generation,
        }
    }

    /// Cursor to the first entry.
    pub fn first(&self) -> Option<InterfaceCursor> {
        self.head.map(|s| self.cursor_at(s))
    }

    /// Cursor to the last entry.
    pub fn last(&self) -> Option<InterfaceCursor> {
        self.tail.map(|s| self.cursor_at(s))
    }

    /// Cursor following `cursor`, `None` at the end or for a stale cursor.
    pub fn next(&self, cursor: InterfaceCursor) -> Option<InterfaceCursor> {
        self.node(cursor)?.next.map(|s| self.cursor_at(s))
    }

    /// Cursor preceding `cursor`.
    pub fn prev(&self, cursor: InterfaceCursor) -> Option<InterfaceCursor> {
        self.node(cursor)?.prev.map(|s| self.cursor_at(s))
    }

    /// Element at `cursor`.
    pub fn get_element(&self, cursor: InterfaceCursor) -> Option<&E> {
        self.node(cursor).map(|n| &n.element)
    }

    /// Mutable element at `cursor`.
    pub fn get_element_mut(&mut self, cursor: InterfaceCursor) -> Option<&mut E> {
        let slot = self.slots.get_mut(cursor.slot)?;
        if slot.generation != cursor.generation {
            return None;
        }
        slot.node.as_mut().map(|n| &mut n.element)
    }

    /// Remove the entry at `cursor` and return the cursor following it.
    ///
    /// Other cursors stay valid. A stale cursor removes nothing and
    /// returns `None`.
    pub fn erase(&mut self, cursor: InterfaceCursor) -> Option<InterfaceCursor> {
        let slot = self.slots.get_mut(cursor.slot)?;
        if slot.generation != cursor.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(cursor.slot);

        match node.prev {
            Some(p) => {
                if let Some(n) = self.slots[p].node.as_mut() {
                    n.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(nx) => {
                if let Some(n) = self.slots[nx].node.as_mut() {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        self.len -= 1;
        node.next.map(|s| self.cursor_at(s))
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len()).rev().collect();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Keep only entries for which `keep` returns true, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&E) -> bool) -> usize {
        let mut removed = 0;
        let mut cur = self.first();
        while let Some(c) = cur {
            let drop_it = self.get_element(c).is_some_and(|e| !keep(e));
            if drop_it {
                cur = self.erase(c);
                removed += 1;
            } else {
                cur = self.next(c);
            }
        }
        removed
    }

    /// Apply `f` to every element in order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut E)) {
        let mut cur = self.head;
        while let Some(s) = cur {
            let node = self.slots[s].node.as_mut();
            match node {
                Some(n) => {
                    f(&mut n.element);
                    cur = n.next;
                }
                None => break,
            }
        }
    }

    /// Elements in interface order.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            slots: &self.slots,
            next: self.head,
            remaining: self.len,
        }
    }

    /// `(cursor, element)` pairs in interface order.
    pub fn cursors(&self) -> Cursors<'_, E> {
        Cursors { inner: self.iter() }
    }
}

impl<E: PartialEq> Interface<E> {
    /// Does the interface hold `element`? Linear in the interface size.
    pub fn contains(&self, element: &E) -> bool {
        self.iter().any(|e| e == element)
    }

    /// Cursor of the first entry equal to `element`.
    pub fn find(&self, element: &E) -> Option<InterfaceCursor> {
        self.cursors().find(|(_, e)| *e == element).map(|(c, _)| c)
    }
}

impl<E: PartialEq + fmt::Debug> Interface<E> {
    /// Append `element`, failing if it is already present.
    pub fn try_push(&mut self, element: E) -> Result<InterfaceCursor, LayoutError> {
        if self.contains(&element) {
            return Err(LayoutError::DuplicateElement {
                partner: self.partner,
                element: format!("{element:?}"),
            });
        }
        Ok(self.push(element))
    }
}

impl<E: Clone> Interface<E> {
    /// Copy of the elements in interface order.
    pub fn to_vec(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }
}

impl<E: PartialEq> PartialEq for Interface<E> {
    fn eq(&self, other: &Self) -> bool {
        self.partner == other.partner
            && self.role == other.role
            && self.len == other.len
            && self.iter().eq(other.iter())
    }
}

impl<E: Eq> Eq for Interface<E> {}

impl<'a, E> IntoIterator for &'a Interface<E> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Iter<'a, E> {
        self.iter()
    }
}

/// Iterator over interface elements in order.
pub struct Iter<'a, E> {
    slots: &'a [Slot<E>],
    next: Option<usize>,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        let slot = self.next?;
        let node = self.slots[slot].node.as_ref()?;
        self.next = node.next;
        self.remaining -= 1;
        Some(&node.element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for Iter<'_, E> {}

/// Iterator over `(cursor, element)` pairs.
pub struct Cursors<'a, E> {
    inner: Iter<'a, E>,
}

impl<'a, E> Iterator for Cursors<'a, E> {
    type Item = (InterfaceCursor, &'a E);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.inner.next?;
        let generation = self.inner.slots[slot].generation;
        let element = self.inner.next()?;
        Some((InterfaceCursor { slot, generation }, element))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<E: Eq + Hash + fmt::Debug> DebugInvariants for Interface<E> {
    fn validate_invariants(&self) -> Result<(), LayoutError> {
        let mut seen = HashSet::with_capacity(self.len);
        let mut count = 0usize;
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        while let Some(s) = cur {
            let node = self.slots[s]
                .node
                .as_ref()
                .ok_or_else(|| LayoutError::InterfaceMismatch {
                    partner: self.partner,
                    reason: format!("link to vacant slot {s}"),
                })?;
            if node.prev != prev {
                return Err(LayoutError::InterfaceMismatch {
                    partner: self.partner,
                    reason: format!("broken back link at slot {s}"),
                });
            }
            if !seen.insert(&node.element) {
                return Err(LayoutError::DuplicateElement {
                    partner: self.partner,
                    element: format!("{:?}", node.element),
                });
            }
            count += 1;
            prev = Some(s);
            cur = node.next;
        }
        if prev != self.tail || count != self.len {
            return Err(LayoutError::InterfaceMismatch {
                partner: self.partner,
                reason: format!("length {} but {} linked entries", self.len, count),
            });
        }
        Ok(())
    }
}
