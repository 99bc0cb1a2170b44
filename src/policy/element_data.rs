//! Variable-length per-element data.

use std::collections::HashMap;

use bytemuck::Pod;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::algs::wire::{put_pod, take_pod};
use crate::layout::interface::Interface;
use crate::policy::{BufferSize, CommunicationPolicy};
use crate::topology::element::ElementId;

/// Copies a variable number of values per element from sender to receiver.
///
/// Each entry is written as a `u32` count followed by the values. Elements
/// without data send a count of zero and clear the receiver's entry.
pub struct ElementDataPolicy<'a, V> {
    data: &'a mut HashMap<ElementId, Vec<V>>,
}

impl<'a, V: Pod> ElementDataPolicy<'a, V> {
    pub fn new(data: &'a mut HashMap<ElementId, Vec<V>>) -> Self {
        Self { data }
    }
}

impl<V: Pod> CommunicationPolicy<ElementId> for ElementDataPolicy<'_, V> {
    fn required_buffer_size(&self, _interface: &Interface<ElementId>) -> BufferSize {
        BufferSize::Unbounded
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<ElementId>) -> bool {
        for e in interface {
            let values = self.data.get(e).map_or(&[][..], Vec::as_slice);
            let Ok(n) = u32::try_from(values.len()) else {
                return false;
            };
            buf.put_u32_le(n);
            for v in values {
                put_pod(buf, v);
            }
        }
        true
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &Interface<ElementId>) -> bool {
        for &e in interface {
            if buf.remaining() < size_of::<u32>() {
                return false;
            }
            let n = buf.get_u32_le() as usize;
            let mut values = Vec::with_capacity(n.min(buf.remaining()));
            for _ in 0..n {
                match take_pod::<V>(buf) {
                    Some(v) => values.push(v),
                    None => return false,
                }
            }
            if values.is_empty() {
                self.data.remove(&e);
            } else {
                self.data.insert(e, values);
            }
        }
        true
    }
}
