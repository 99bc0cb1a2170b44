//! Numeric vector entry exchange over index interfaces.
//!
//! Values travel as raw `Pod` bytes in the sender's native byte order.

use std::ops::AddAssign;

use bytemuck::Pod;
use bytes::{Bytes, BytesMut};

use crate::algs::wire::{put_pod, take_pod};
use crate::layout::index_layout::IndexInterface;
use crate::policy::{BufferSize, CommunicationPolicy};

fn collect_entries<T: Pod>(values: &[T], buf: &mut BytesMut, interface: &IndexInterface) -> bool {
    let mut ok = true;
    for &i in interface {
        match values.get(i) {
            Some(v) => put_pod(buf, v),
            None => {
                log::warn!(
                    "index {i} in interface to rank {} is outside a vector of length {}",
                    interface.partner(),
                    values.len()
                );
                put_pod(buf, &T::zeroed());
                ok = false;
            }
        }
    }
    ok
}

fn extract_entries<T: Pod>(
    values: &mut [T],
    buf: &mut Bytes,
    interface: &IndexInterface,
    mut apply: impl FnMut(&mut T, T),
) -> bool {
    let mut ok = true;
    for &i in interface {
        let Some(received) = take_pod::<T>(buf) else {
            return false;
        };
        match values.get_mut(i) {
            Some(slot) => apply(slot, received),
            None => ok = false,
        }
    }
    ok
}

/// Copies received entries over local entries (`v[i] = received`).
pub struct VectorCopyPolicy<'a, T> {
    values: &'a mut [T],
}

impl<'a, T: Pod> VectorCopyPolicy<'a, T> {
    pub fn new(values: &'a mut [T]) -> Self {
        Self { values }
    }
}

impl<T: Pod> CommunicationPolicy<usize> for VectorCopyPolicy<'_, T> {
    fn required_buffer_size(&self, interface: &IndexInterface) -> BufferSize {
        BufferSize::Exact(interface.len() * size_of::<T>())
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &IndexInterface) -> bool {
        collect_entries(self.values, buf, interface)
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &IndexInterface) -> bool {
        extract_entries(self.values, buf, interface, |slot, v| *slot = v)
    }
}

/// Adds received entries to local entries (`v[i] += received`).
///
/// Typical use: slaves send their partial sums to the master.
pub struct VectorAddPolicy<'a, T> {
    values: &'a mut [T],
}

impl<'a, T: Pod + AddAssign> VectorAddPolicy<'a, T> {
    pub fn new(values: &'a mut [T]) -> Self {
        Self { values }
    }
}

impl<T: Pod + AddAssign> CommunicationPolicy<usize> for VectorAddPolicy<'_, T> {
    fn required_buffer_size(&self, interface: &IndexInterface) -> BufferSize {
        BufferSize::Exact(interface.len() * size_of::<T>())
    }

    fn collect(&mut self, buf: &mut BytesMut, interface: &IndexInterface) -> bool {
        collect_entries(self.values, buf, interface)
    }

    fn extract(&mut self, buf: &mut Bytes, interface: &IndexInterface) -> bool {
        extract_entries(self.values, buf, interface, |slot, v| *slot += v)
    }
}
