//! Global id verification along interfaces.
//!
//! Both sides send the global ids of their interface entries. The receiver
//! compares them position by position with its own ids and records every
//! disagreement. Unlike [`verify_layouts`](crate::algs::verify::verify_layouts)
//! it runs over existing interfaces inside any interface round.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::algs::wire::{GLOBAL_ID_BYTES, put_global_id};
use crate::layout::interface::Interface;
use crate::policy::{BufferSize, CommunicationPolicy};
use crate::topology::global_id::{GlobalId, GlobalIdLookup};

/// A disagreement found while comparing an interface with its partner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdMismatch {
    /// The two interfaces have different sizes.
    Length {
        partner: usize,
        local: usize,
        remote: usize,
    },
    /// Entry `position` names different entities on the two sides.
    Id {
        partner: usize,
        position: usize,
        local: Option<GlobalId>,
        remote: Option<GlobalId>,
    },
}

/// Sends and compares global ids; see the module docs.
pub struct GlobalIdCheckPolicy<'a, E, L: ?Sized> {
    lookup: &'a L,
    mismatches: Vec<IdMismatch>,
    _elem: PhantomData<fn(&E)>,
}

impl<'a, E, L: GlobalIdLookup<E> + ?Sized> GlobalIdCheckPolicy<'a, E, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            mismatches: Vec::new(),
            _elem: PhantomData,
        }
    }

    pub fn mismatches(&self) -> &[IdMismatch] {
        &self.mismatches
    }

    pub fn into_mismatches(self) -> Vec<IdMismatch> {
        self.mismatches
    }
}

impl<E, L: GlobalIdLookup<E> + ?Sized> CommunicationPolicy<E> for GlobalIdCheckPolicy<'_, E, L> {
    // Sizes may legitimately differ between the two sides; the count
    // prefix lets `extract` report that instead of failing the round.
    fn required_buffer_size(&self, _interface: &Interface<E>) -> BufferSize {
        BufferSize::Unbounded
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<E>) -> bool {
        let mut ok = true;
        buf.put_u64_le(interface.len() as u64);
        for e in interface {
            match self.lookup.global_id(e) {
                Some(id) => put_global_id(buf, id),
                None => {
                    buf.put_i32_le(-1);
                    buf.put_u64_le(0);
                    ok = false;
                }
            }
        }
        ok
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<E>) -> bool {
        let partner = interface.partner();
        if buf.remaining() < 8 {
            return false;
        }
        let remote_len = buf.get_u64_le() as usize;
        if remote_len != interface.len() {
            self.mismatches.push(IdMismatch::Length {
                partner,
                local: interface.len(),
                remote: remote_len,
            });
            buf.advance(buf.remaining());
            return false;
        }
        let mut ok = true;
        for (position, e) in interface.iter().enumerate() {
            if buf.remaining() < GLOBAL_ID_BYTES {
                return false;
            }
            let owner = buf.get_i32_le();
            let seq = buf.get_u64_le();
            let remote = (owner >= 0).then(|| GlobalId::new(owner as usize, seq));
            let local = self.lookup.global_id(e);
            if local.is_none() || local != remote {
                self.mismatches.push(IdMismatch::Id {
                    partner,
                    position,
                    local,
                    remote,
                });
                ok = false;
            }
        }
        ok
    }
}
