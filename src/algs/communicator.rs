//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte buffers. One call to
//! [`Communicator::exchange`] is one communication round: every send is
//! posted, every expected receive is matched, and the call returns once the
//! caller's own transfers are complete. Other ranks may still be busy with
//! unrelated work.
//!
//! Within one `(source, destination, tag)` triple messages arrive in the
//! order they were sent. Nothing is promised about the relative order of
//! different sources.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Barrier};

use bytes::Bytes;
use dashmap::DashMap;

use crate::layout_error::LayoutError;

/// Typed message tag. Distinct protocols use distinct tags so concurrent
/// rounds on the same communicator never match each other's messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` steps after this one (wrapping).
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Blocking, round-based communication interface.
pub trait Communicator {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of processes.
    fn size(&self) -> usize;

    /// Block until every process reached the barrier.
    fn barrier(&self);

    /// One communication round.
    ///
    /// Sends every `(destination, payload)` pair in `sends` and receives
    /// exactly one message from every rank in `sources`. At most one
    /// message per destination and per source.
    fn exchange(
        &self,
        tag: CommTag,
        sends: Vec<(usize, Bytes)>,
        sources: &[usize],
    ) -> Result<BTreeMap<usize, Bytes>, LayoutError>;

    /// Fail if `rank` is not a member of this communicator.
    fn check_rank(&self, rank: usize) -> Result<(), LayoutError> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(LayoutError::RankOutOfRange {
                rank,
                size: self.size(),
            })
        }
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Single-process communicator: rank 0 of 1, nothing to exchange.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn exchange(
        &self,
        _tag: CommTag,
        sends: Vec<(usize, Bytes)>,
        sources: &[usize],
    ) -> Result<BTreeMap<usize, Bytes>, LayoutError> {
        let mut loopback: BTreeMap<usize, Bytes> = BTreeMap::new();
        for (peer, payload) in sends {
            self.check_rank(peer)?;
            loopback.insert(peer, payload);
        }
        let mut out = BTreeMap::new();
        for &src in sources {
            let msg = loopback.remove(&src).ok_or_else(|| LayoutError::CommError {
                neighbor: src,
                reason: "no message posted on a single-process communicator".into(),
            })?;
            out.insert(src, msg);
        }
        Ok(out)
    }
}

// --- ThreadComm: one thread per rank inside one process ---

type Key = (usize, usize, u16); // (src, dst, tag)

struct Mailbox {
    queues: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
}

/// In-process communicator for running several ranks on threads.
///
/// All ranks created by one [`ThreadComm::world`] call share a mailbox.
/// Worlds are independent of each other, so concurrently running tests do
/// not see each other's messages.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

/// Pending receive on a [`ThreadComm`].
pub struct LocalHandle {
    key: Key,
    mailbox: Arc<Mailbox>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.queues.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl ThreadComm {
    /// Communicators for ranks `0..size` sharing one mailbox.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox {
            queues: DashMap::new(),
            barrier: Barrier::new(size.max(1)),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Post a message; returns immediately.
    pub fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .queues
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    /// Post a receive; the message is taken when the handle is waited on.
    pub fn irecv(&self, peer: usize, tag: u16) -> LocalHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.mailbox.barrier.wait();
    }

    fn exchange(
        &self,
        tag: CommTag,
        sends: Vec<(usize, Bytes)>,
        sources: &[usize],
    ) -> Result<BTreeMap<usize, Bytes>, LayoutError> {
        // 0) validate every peer before anything is posted
        for &src in sources {
            self.check_rank(src)?;
        }
        for (peer, _) in &sends {
            self.check_rank(*peer)?;
        }

        // 1) post all receives
        let pending: Vec<_> = sources
            .iter()
            .map(|&src| (src, self.irecv(src, tag.as_u16())))
            .collect();

        // 2) post all sends
        for (peer, payload) in &sends {
            self.isend(*peer, tag.as_u16(), payload);
        }

        // 3) wait for every receive
        let mut out = BTreeMap::new();
        for (src, handle) in pending {
            let data = handle.wait().ok_or_else(|| LayoutError::CommError {
                neighbor: src,
                reason: format!("failed to receive from rank {src}"),
            })?;
            out.insert(src, Bytes::from(data));
        }
        Ok(out)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{
        Communicator as MpiCommunicator, CommunicatorCollectives, Destination, Source,
    };

    /// MPI-backed communicator. MPI must already be initialized.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }

        pub fn world(&self) -> &SimpleCommunicator {
            &self.world
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn exchange(
            &self,
            tag: CommTag,
            sends: Vec<(usize, Bytes)>,
            sources: &[usize],
        ) -> Result<BTreeMap<usize, Bytes>, LayoutError> {
            for &src in sources {
                self.check_rank(src)?;
            }
            for (peer, _) in &sends {
                self.check_rank(*peer)?;
            }
            let tag = i32::from(tag.as_u16());
            let received = mpi::request::scope(|scope| {
                let requests: Vec<_> = sends
                    .iter()
                    .map(|(peer, payload)| {
                        self.world
                            .process_at_rank(*peer as i32)
                            .immediate_send_with_tag(scope, &payload[..], tag)
                    })
                    .collect();
                let mut out = BTreeMap::new();
                for &src in sources {
                    let (msg, _status) = self
                        .world
                        .process_at_rank(src as i32)
                        .receive_vec_with_tag::<u8>(tag);
                    out.insert(src, Bytes::from(msg));
                }
                for req in requests {
                    req.wait();
                }
                out
            });
            Ok(received)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
