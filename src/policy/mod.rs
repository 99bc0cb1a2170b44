//! Communication policies: payload-agnostic collect/extract over interfaces.
//!
//! A policy turns per-element state into bytes on the sending side
//! ([`CommunicationPolicy::collect`]) and applies received bytes to local
//! state on the receiving side ([`CommunicationPolicy::extract`]). The
//! interface communicator never looks at the payload.
//!
//! Contract for every implementation:
//! - exactly one value per interface entry, written and read in interface
//!   iteration order (the master and slave sides declare their interfaces in
//!   the same order, so position `i` names the same entity on both ends);
//! - interfaces are read only, a policy never inserts or erases entries;
//! - a received value that conflicts with already resolved local state is
//!   not applied and `extract` returns `false`. The caller decides whether
//!   that is an error.

use bytes::{Bytes, BytesMut};

use crate::layout::interface::Interface;
use crate::layout::layout::Layout;

pub mod element_data;
pub mod global_id_check;
pub mod subset;
pub mod vector;

pub use element_data::ElementDataPolicy;
pub use global_id_check::{GlobalIdCheckPolicy, IdMismatch};
pub use subset::{SelectionFlagPolicy, SubsetConflict, SubsetIndexPolicy};
pub use vector::{VectorAddPolicy, VectorCopyPolicy};

/// Number of bytes a policy writes for one interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferSize {
    /// Exactly this many bytes; the communicator checks it on both ends.
    Exact(usize),
    /// Not known in advance; the buffer grows as needed.
    Unbounded,
}

impl BufferSize {
    /// Bytes to preallocate.
    pub fn capacity_hint(self) -> usize {
        match self {
            BufferSize::Exact(n) => n,
            BufferSize::Unbounded => 0,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, BufferSize::Exact(_))
    }
}

/// Collect/extract contract for exchanging per-element data along an
/// [`Interface`] with elements of type `E`.
pub trait CommunicationPolicy<E> {
    /// Bytes [`collect`](Self::collect) will write for `interface`.
    fn required_buffer_size(&self, interface: &Interface<E>) -> BufferSize {
        let _ = interface;
        BufferSize::Unbounded
    }

    /// Append one value per entry of `interface` to `buf`.
    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<E>) -> bool;

    /// Consume one value per entry of `interface` from `buf` and apply it.
    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<E>) -> bool;

    /// Called once before the interfaces of `layout` are collected.
    fn begin_layout_collection(&mut self, layout: &Layout<E>) -> bool {
        let _ = layout;
        true
    }

    fn end_layout_collection(&mut self) -> bool {
        true
    }

    /// Called once before the interfaces of `layout` are extracted.
    fn begin_layout_extraction(&mut self, layout: &Layout<E>) -> bool {
        let _ = layout;
        true
    }

    fn end_layout_extraction(&mut self) -> bool {
        true
    }
}

impl<E, P: CommunicationPolicy<E> + ?Sized> CommunicationPolicy<E> for &mut P {
    fn required_buffer_size(&self, interface: &Interface<E>) -> BufferSize {
        (**self).required_buffer_size(interface)
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<E>) -> bool {
        (**self).collect(buf, interface)
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<E>) -> bool {
        (**self).extract(buf, interface)
    }

    fn begin_layout_collection(&mut self, layout: &Layout<E>) -> bool {
        (**self).begin_layout_collection(layout)
    }

    fn end_layout_collection(&mut self) -> bool {
        (**self).end_layout_collection()
    }

    fn begin_layout_extraction(&mut self, layout: &Layout<E>) -> bool {
        (**self).begin_layout_extraction(layout)
    }

    fn end_layout_extraction(&mut self) -> bool {
        (**self).end_layout_extraction()
    }
}
