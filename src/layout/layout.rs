//! Layout: partner rank → [`Interface`] for one element kind and one role.
//!
//! Interfaces are created lazily by [`Layout::interface`]. An interface that
//! loses all its entries stays in the layout until an explicit
//! [`Layout::remove_empty_interfaces`] pass, so a layout never changes shape
//! behind the back of an ongoing exchange.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::debug_invariants::DebugInvariants;
use crate::layout::interface::{Interface, InterfaceRole};
use crate::layout_error::LayoutError;

/// Interfaces of one role, keyed by partner rank in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout<E> {
    role: InterfaceRole,
    interfaces: BTreeMap<usize, Interface<E>>,
}

impl<E> Layout<E> {
    pub fn new(role: InterfaceRole) -> Self {
        Self {
            role,
            interfaces: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn role(&self) -> InterfaceRole {
        self.role
    }

    /// Interface to `partner`, created empty if it does not exist yet.
    pub fn interface(&mut self, partner: usize) -> &mut Interface<E> {
        let role = self.role;
        self.interfaces
            .entry(partner)
            .or_insert_with(|| Interface::new(partner, role))
    }

    /// Interface to `partner` without implicit creation.
    pub fn try_interface(&self, partner: usize) -> Result<&Interface<E>, LayoutError> {
        self.interfaces
            .get(&partner)
            .ok_or(LayoutError::MissingInterface { partner })
    }

    /// Mutable variant of [`Layout::try_interface`].
    pub fn try_interface_mut(&mut self, partner: usize) -> Result<&mut Interface<E>, LayoutError> {
        self.interfaces
            .get_mut(&partner)
            .ok_or(LayoutError::MissingInterface { partner })
    }

    pub fn get(&self, partner: usize) -> Option<&Interface<E>> {
        self.interfaces.get(&partner)
    }

    pub fn has_interface(&self, partner: usize) -> bool {
        self.interfaces.contains_key(&partner)
    }

    /// Remove the interface to `partner`, returning it.
    pub fn erase_interface(&mut self, partner: usize) -> Option<Interface<E>> {
        self.interfaces.remove(&partner)
    }

    /// Delete every interface without entries. Returns how many were removed.
    pub fn remove_empty_interfaces(&mut self) -> usize {
        let before = self.interfaces.len();
        self.interfaces.retain(|_, iface| !iface.is_empty());
        before - self.interfaces.len()
    }

    /// Number of interfaces, empty ones included.
    pub fn num_interfaces(&self) -> usize {
        self.interfaces.len()
    }

    /// Total number of entries over all interfaces.
    pub fn num_elements(&self) -> usize {
        self.interfaces.values().map(Interface::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Partner ranks in ascending order.
    pub fn partners(&self) -> impl Iterator<Item = usize> + '_ {
        self.interfaces.keys().copied()
    }

    /// Interfaces in ascending partner order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Interface<E>)> {
        self.interfaces.iter().map(|(&p, i)| (p, i))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Interface<E>)> {
        self.interfaces.iter_mut().map(|(&p, i)| (p, i))
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }
}

impl<E: Clone + Eq + Hash> Layout<E> {
    /// Distinct elements over all interfaces, in first-seen order.
    pub fn collect_elements(&self) -> Vec<E> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for iface in self.interfaces.values() {
            for e in iface {
                if seen.insert(e.clone()) {
                    out.push(e.clone());
                }
            }
        }
        out
    }
}

impl<E: PartialEq> Layout<E> {
    /// Is `element` present in any interface?
    pub fn contains_element(&self, element: &E) -> bool {
        self.interfaces.values().any(|i| i.contains(element))
    }

    /// Ranks whose interface holds `element`.
    pub fn partners_of(&self, element: &E) -> Vec<usize> {
        self.interfaces
            .iter()
            .filter_map(|(&p, i)| i.contains(element).then_some(p))
            .collect()
    }
}

impl<E: Eq + Hash + fmt::Debug> DebugInvariants for Layout<E> {
    fn validate_invariants(&self) -> Result<(), LayoutError> {
        for (&partner, iface) in &self.interfaces {
            if iface.partner() != partner || iface.role() != self.role {
                return Err(LayoutError::InterfaceMismatch {
                    partner,
                    reason: format!(
                        "interface stored under rank {partner} targets rank {} as {}",
                        iface.partner(),
                        iface.role()
                    ),
                });
            }
            iface.validate_invariants()?;
        }
        Ok(())
    }
}
