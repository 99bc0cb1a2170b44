//! Fixed, versioned, little-endian wire records for interface communication.
//!
//! A round message is a [`WireHdr`] followed by frames. Each frame is a
//! [`WireLen`] byte count and that many payload bytes. Payload values
//! written through [`put_pod`] use the native byte order of the sender;
//! both ends of one deployment must agree on it.

use bytemuck::{Pod, Zeroable};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

use crate::layout_error::LayoutError;
use crate::topology::global_id::GlobalId;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Message kinds carried in [`WireHdr::kind_le`].
pub const KIND_INTERFACE_DATA: u16 = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub frames_le: u32,
}

impl WireHdr {
    pub const SIZE: usize = 8;

    pub fn new(kind: u16, frames: usize) -> Self {
        debug_assert!(u32::try_from(frames).is_ok(), "{frames} frames overflow the header");
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            frames_le: (frames as u32).to_le(),
        }
    }

    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }

    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }

    pub fn frames(&self) -> usize {
        u32::from_le(self.frames_le) as usize
    }
}

/// Byte count of one frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireLen {
    pub n_le: u64,
}

impl WireLen {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

const _: () = {
    assert!(size_of::<WireHdr>() == WireHdr::SIZE);
    assert!(size_of::<WireLen>() == 8);
};

pub fn put_header(out: &mut BytesMut, hdr: WireHdr) {
    out.put_slice(bytemuck::bytes_of(&hdr));
}

/// Read and check a header from the front of `buf`.
pub fn take_header(buf: &mut Bytes, neighbor: usize, kind: u16) -> Result<WireHdr, LayoutError> {
    if buf.remaining() < WireHdr::SIZE {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: format!("message of {} bytes has no header", buf.remaining()),
        });
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&buf[..WireHdr::SIZE]);
    buf.advance(WireHdr::SIZE);
    if hdr.version() != WIRE_VERSION || hdr.kind() != kind {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: format!(
                "header version {} kind {} (expected version {WIRE_VERSION} kind {kind})",
                hdr.version(),
                hdr.kind()
            ),
        });
    }
    Ok(hdr)
}

/// Append one length-prefixed frame.
pub fn put_frame(out: &mut BytesMut, payload: &[u8]) {
    out.put_slice(bytemuck::bytes_of(&WireLen::new(payload.len())));
    out.put_slice(payload);
}

/// Split the next frame off the front of `buf`.
pub fn take_frame(buf: &mut Bytes, neighbor: usize) -> Result<Bytes, LayoutError> {
    if buf.remaining() < size_of::<WireLen>() {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: "truncated frame length".into(),
        });
    }
    let len: WireLen = bytemuck::pod_read_unaligned(&buf[..size_of::<WireLen>()]);
    buf.advance(size_of::<WireLen>());
    let n = len.get();
    if buf.remaining() < n {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: format!("frame announces {n} bytes, {} left", buf.remaining()),
        });
    }
    Ok(buf.split_to(n))
}

/// Check that a buffer has exactly the expected length.
pub fn expect_exact_len(actual: usize, expected: usize, neighbor: usize) -> Result<(), LayoutError> {
    if actual == expected {
        Ok(())
    } else {
        Err(LayoutError::MalformedMessage {
            neighbor,
            reason: format!("expected {expected} bytes, got {actual}"),
        })
    }
}

/// Append the raw bytes of one plain-old-data value.
#[inline]
pub fn put_pod<T: Pod>(out: &mut BytesMut, value: &T) {
    out.put_slice(bytemuck::bytes_of(value));
}

/// Read one plain-old-data value; `None` if too few bytes remain.
#[inline]
pub fn take_pod<T: Pod>(buf: &mut Bytes) -> Option<T> {
    let n = size_of::<T>();
    if buf.remaining() < n {
        return None;
    }
    let v = bytemuck::pod_read_unaligned(&buf[..n]);
    buf.advance(n);
    Some(v)
}

/// Encoded size of one [`GlobalId`].
pub const GLOBAL_ID_BYTES: usize = 12;

/// Rank as the signed 32-bit wire field. MPI ranks are `i32`, so a larger
/// rank cannot occur on a real communicator.
pub fn rank_to_wire(rank: usize) -> i32 {
    debug_assert!(i32::try_from(rank).is_ok(), "rank {rank} does not fit an i32 wire field");
    rank as i32
}

/// Append `id` as `owner:i32, local_seq:u64`, little-endian.
pub fn put_global_id<B: BufMut>(out: &mut B, id: GlobalId) {
    out.put_i32_le(rank_to_wire(id.owner));
    out.put_u64_le(id.local_seq);
}

/// Read one global id written by [`put_global_id`].
pub fn take_global_id<B: Buf>(buf: &mut B, neighbor: usize) -> Result<GlobalId, LayoutError> {
    if buf.remaining() < GLOBAL_ID_BYTES {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: "truncated global id".into(),
        });
    }
    let owner = buf.get_i32_le();
    let seq = buf.get_u64_le();
    if owner < 0 {
        return Err(LayoutError::MalformedMessage {
            neighbor,
            reason: format!("negative owner rank {owner}"),
        });
    }
    Ok(GlobalId::new(owner as usize, seq))
}
