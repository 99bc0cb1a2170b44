//! Interface communicator: one communication round of policy-driven exchange.
//!
//! Transfers are registered first and exchanged together:
//!
//! 1. [`InterfaceCommunicator::send_data`] / [`send_layout_data`] collect
//!    policy payloads right away into one outgoing message per target rank.
//! 2. [`InterfaceCommunicator::receive_data`] / [`receive_layout_data`]
//!    register a pending extraction per source rank.
//! 3. [`InterfaceCommunicator::communicate`] performs one blocking
//!    [`Communicator::exchange`] and runs every pending extraction.
//!
//! Within one pair of ranks chunks are consumed in registration order, so
//! both ends must register their transfers to each other in the same order.
//! A message is a [`WireHdr`](crate::algs::wire::WireHdr) followed by one
//! length-prefixed frame per registered transfer.
//!
//! [`send_layout_data`]: InterfaceCommunicator::send_layout_data
//! [`receive_layout_data`]: InterfaceCommunicator::receive_layout_data

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{self, KIND_INTERFACE_DATA, WireHdr};
use crate::layout::interface::Interface;
use crate::layout::layout::Layout;
use crate::layout_error::LayoutError;
use crate::policy::{BufferSize, CommunicationPolicy};

/// Default tag of interface communication rounds.
pub const INTERFACE_TAG: CommTag = CommTag::new(0x4C59);

/// Per-round settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExchangeOptions {
    pub tag: CommTag,
    /// Turn refused extractions into [`LayoutError::Consistency`].
    pub escalate_failures: bool,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            tag: INTERFACE_TAG,
            escalate_failures: false,
        }
    }
}

impl ExchangeOptions {
    pub fn with_tag(tag: CommTag) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub fn escalate(mut self) -> Self {
        self.escalate_failures = true;
        self
    }
}

/// Handle for a raw receive; redeem it with [`CommunicationReport::take_raw`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawTicket(usize);

/// Outcome of one round.
#[derive(Debug, Default)]
pub struct CommunicationReport {
    /// Partner rank of every interface whose extraction returned `false`.
    pub extract_failures: Vec<usize>,
    /// Partner rank of every interface whose collection returned `false`.
    pub collect_failures: Vec<usize>,
    pub bytes_sent: usize,
    pub bytes_received: usize,
    raw: BTreeMap<RawTicket, Bytes>,
}

impl CommunicationReport {
    /// `true` if every policy call succeeded.
    pub fn is_consistent(&self) -> bool {
        self.extract_failures.is_empty() && self.collect_failures.is_empty()
    }

    /// Payload of a raw receive registered in this round.
    pub fn take_raw(&mut self, ticket: RawTicket) -> Option<Bytes> {
        self.raw.remove(&ticket)
    }

    /// Escalate refused extractions to [`LayoutError::Consistency`].
    pub fn into_result(self) -> Result<Self, LayoutError> {
        match self.extract_failures.first() {
            None => Ok(self),
            Some(&neighbor) => Err(LayoutError::Consistency {
                neighbor,
                failures: self.extract_failures.len(),
            }),
        }
    }
}

/// A registered receive, run once its frame has arrived.
trait Extraction {
    fn begin(&mut self) -> bool {
        true
    }
    /// Apply the frame received from `source`.
    fn extract(&mut self, source: usize, frame: &mut Bytes) -> Result<bool, LayoutError>;
    fn end(&mut self) -> bool {
        true
    }
    /// Ranks blamed when `begin` or `end` refuses.
    fn sources(&self) -> Vec<usize> {
        Vec::new()
    }
}

/// Check an exact-size frame, run the policy and make sure it consumed everything.
fn run_extract<E, P>(
    policy: &mut P,
    interface: &Interface<E>,
    source: usize,
    frame: &mut Bytes,
) -> Result<bool, LayoutError>
where
    P: CommunicationPolicy<E> + ?Sized,
{
    if let BufferSize::Exact(n) = policy.required_buffer_size(interface) {
        wire::expect_exact_len(frame.len(), n, source)?;
    }
    let ok = policy.extract(frame, interface);
    if ok && !frame.is_empty() {
        return Err(LayoutError::MalformedMessage {
            neighbor: source,
            reason: format!("{} trailing bytes after extraction", frame.len()),
        });
    }
    Ok(ok)
}

struct InterfaceExtraction<'a, E, P: ?Sized> {
    interface: &'a Interface<E>,
    policy: &'a mut P,
}

impl<E, P: CommunicationPolicy<E> + ?Sized> Extraction for InterfaceExtraction<'_, E, P> {
    fn extract(&mut self, source: usize, frame: &mut Bytes) -> Result<bool, LayoutError> {
        run_extract(self.policy, self.interface, source, frame)
    }
}

struct LayoutExtraction<'a, E, P: ?Sized> {
    layout: &'a Layout<E>,
    policy: &'a mut P,
}

impl<E, P: CommunicationPolicy<E> + ?Sized> Extraction for LayoutExtraction<'_, E, P> {
    fn begin(&mut self) -> bool {
        self.policy.begin_layout_extraction(self.layout)
    }

    fn extract(&mut self, source: usize, frame: &mut Bytes) -> Result<bool, LayoutError> {
        let interface = self
            .layout
            .get(source)
            .ok_or(LayoutError::MissingInterface { partner: source })?;
        run_extract(self.policy, interface, source, frame)
    }

    fn end(&mut self) -> bool {
        self.policy.end_layout_extraction()
    }

    fn sources(&self) -> Vec<usize> {
        self.layout.partners().collect()
    }
}

enum Slot {
    Raw(RawTicket),
    Extract(usize),
}

/// Registers transfers and runs them in one communication round.
///
/// An instance covers exactly one round: [`communicate`](Self::communicate)
/// consumes it and releases every borrowed policy.
pub struct InterfaceCommunicator<'a, C: Communicator + ?Sized> {
    comm: &'a C,
    options: ExchangeOptions,
    outgoing: BTreeMap<usize, Vec<Bytes>>,
    incoming: BTreeMap<usize, Vec<Slot>>,
    extractions: Vec<Box<dyn Extraction + 'a>>,
    collect_failures: Vec<usize>,
    next_ticket: usize,
}

impl<'a, C: Communicator + ?Sized> InterfaceCommunicator<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self::with_options(comm, ExchangeOptions::default())
    }

    pub fn with_options(comm: &'a C, options: ExchangeOptions) -> Self {
        Self {
            comm,
            options,
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
            extractions: Vec::new(),
            collect_failures: Vec::new(),
            next_ticket: 0,
        }
    }

    pub fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    fn check_peer(&self, peer: usize) -> Result<(), LayoutError> {
        if peer == self.comm.rank() {
            return Err(LayoutError::SelfInterface { rank: peer });
        }
        self.comm.check_rank(peer)
    }

    /// Queue an opaque chunk for `target`.
    pub fn send_raw(&mut self, target: usize, data: impl Into<Bytes>) -> Result<(), LayoutError> {
        self.check_peer(target)?;
        self.outgoing.entry(target).or_default().push(data.into());
        Ok(())
    }

    /// Expect an opaque chunk from `source`.
    pub fn receive_raw(&mut self, source: usize) -> Result<RawTicket, LayoutError> {
        self.check_peer(source)?;
        let ticket = RawTicket(self.next_ticket);
        self.next_ticket += 1;
        self.incoming.entry(source).or_default().push(Slot::Raw(ticket));
        Ok(ticket)
    }

    /// Collect `policy` over `interface` for its partner.
    pub fn send_data<E, P>(&mut self, interface: &Interface<E>, policy: &mut P) -> Result<(), LayoutError>
    where
        P: CommunicationPolicy<E> + ?Sized,
    {
        let target = interface.partner();
        self.check_peer(target)?;
        let size = policy.required_buffer_size(interface);
        let mut buf = BytesMut::with_capacity(size.capacity_hint());
        if !policy.collect(&mut buf, interface) {
            self.collect_failures.push(target);
        }
        if let BufferSize::Exact(expected) = size {
            if buf.len() != expected {
                return Err(LayoutError::BufferSizeMismatch {
                    partner: target,
                    expected,
                    actual: buf.len(),
                });
            }
        }
        log::trace!("collected {} bytes for rank {target}", buf.len());
        self.outgoing.entry(target).or_default().push(buf.freeze());
        Ok(())
    }

    /// [`send_data`](Self::send_data) for every interface of `layout`.
    pub fn send_layout_data<E, P>(&mut self, layout: &Layout<E>, policy: &mut P) -> Result<(), LayoutError>
    where
        P: CommunicationPolicy<E> + ?Sized,
    {
        if !policy.begin_layout_collection(layout) {
            self.collect_failures.extend(layout.partners());
        }
        for (_, interface) in layout.iter() {
            self.send_data(interface, policy)?;
        }
        if !policy.end_layout_collection() {
            self.collect_failures.extend(layout.partners());
        }
        Ok(())
    }

    /// Extract `policy` over `interface` once the round has run.
    pub fn receive_data<E, P>(
        &mut self,
        interface: &'a Interface<E>,
        policy: &'a mut P,
    ) -> Result<(), LayoutError>
    where
        E: 'a,
        P: CommunicationPolicy<E> + ?Sized + 'a,
    {
        let source = interface.partner();
        self.check_peer(source)?;
        let idx = self.extractions.len();
        self.extractions
            .push(Box::new(InterfaceExtraction { interface, policy }));
        self.incoming.entry(source).or_default().push(Slot::Extract(idx));
        Ok(())
    }

    /// [`receive_data`](Self::receive_data) for every interface of `layout`.
    pub fn receive_layout_data<E, P>(
        &mut self,
        layout: &'a Layout<E>,
        policy: &'a mut P,
    ) -> Result<(), LayoutError>
    where
        E: 'a,
        P: CommunicationPolicy<E> + ?Sized + 'a,
    {
        for source in layout.partners() {
            self.check_peer(source)?;
        }
        let idx = self.extractions.len();
        self.extractions.push(Box::new(LayoutExtraction { layout, policy }));
        for source in layout.partners() {
            self.incoming.entry(source).or_default().push(Slot::Extract(idx));
        }
        Ok(())
    }

    /// Exchange everything registered and run the pending extractions.
    ///
    /// Malformed messages abort the round with an error. Refused
    /// extractions are listed in the report, or returned as
    /// [`LayoutError::Consistency`] when
    /// [`ExchangeOptions::escalate_failures`] is set.
    pub fn communicate(mut self) -> Result<CommunicationReport, LayoutError> {
        let mut report = CommunicationReport {
            collect_failures: std::mem::take(&mut self.collect_failures),
            ..CommunicationReport::default()
        };

        let outgoing = std::mem::take(&mut self.outgoing);
        let mut sends = Vec::with_capacity(outgoing.len());
        for (target, frames) in outgoing {
            let body: usize = frames.iter().map(|f| f.len() + 8).sum();
            let mut msg = BytesMut::with_capacity(WireHdr::SIZE + body);
            wire::put_header(&mut msg, WireHdr::new(KIND_INTERFACE_DATA, frames.len()));
            for frame in &frames {
                wire::put_frame(&mut msg, frame);
            }
            report.bytes_sent += msg.len();
            sends.push((target, msg.freeze()));
        }
        let sources: Vec<usize> = self.incoming.keys().copied().collect();
        log::debug!(
            "rank {}: interface round on tag {:?}, {} sends, {} receives",
            self.comm.rank(),
            self.options.tag,
            sends.len(),
            sources.len()
        );

        let mut received = self.comm.exchange(self.options.tag, sends, &sources)?;

        for ext in self.extractions.iter_mut() {
            if !ext.begin() {
                report.extract_failures.extend(ext.sources());
            }
        }
        for (source, slots) in std::mem::take(&mut self.incoming) {
            let mut msg = received.remove(&source).ok_or_else(|| LayoutError::CommError {
                neighbor: source,
                reason: "no message received".into(),
            })?;
            report.bytes_received += msg.len();
            let hdr = wire::take_header(&mut msg, source, KIND_INTERFACE_DATA)?;
            if hdr.frames() != slots.len() {
                return Err(LayoutError::MalformedMessage {
                    neighbor: source,
                    reason: format!("{} frames received, {} expected", hdr.frames(), slots.len()),
                });
            }
            for slot in slots {
                let mut frame = wire::take_frame(&mut msg, source)?;
                match slot {
                    Slot::Raw(ticket) => {
                        report.raw.insert(ticket, frame);
                    }
                    Slot::Extract(idx) => {
                        let ok = match self.extractions.get_mut(idx) {
                            Some(ext) => ext.extract(source, &mut frame)?,
                            None => false,
                        };
                        if !ok {
                            report.extract_failures.push(source);
                        }
                    }
                }
            }
            wire::expect_exact_len(msg.len(), 0, source)?;
        }
        for ext in self.extractions.iter_mut() {
            if !ext.end() {
                report.extract_failures.extend(ext.sources());
            }
        }

        if !report.extract_failures.is_empty() {
            log::warn!(
                "rank {}: {} interface extraction(s) refused (partners {:?})",
                self.comm.rank(),
                report.extract_failures.len(),
                report.extract_failures
            );
        }
        if self.options.escalate_failures {
            report.into_result()
        } else {
            Ok(report)
        }
    }
}

/// Send along `send_layout`, receive along `recv_layout`, in one round.
///
/// The common pattern of copying master values to slaves (or adding slave
/// values to masters) with one policy object.
pub fn exchange_layout_data<C, E, P>(
    comm: &C,
    send_layout: &Layout<E>,
    recv_layout: &Layout<E>,
    policy: &mut P,
    options: ExchangeOptions,
) -> Result<CommunicationReport, LayoutError>
where
    C: Communicator + ?Sized,
    P: CommunicationPolicy<E> + ?Sized,
{
    let mut ic = InterfaceCommunicator::with_options(comm, options);
    ic.send_layout_data(send_layout, policy)?;
    ic.receive_layout_data(recv_layout, policy)?;
    ic.communicate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::layout::interface::InterfaceRole;
    use crate::policy::VectorCopyPolicy;

    #[test]
    fn self_interface_is_rejected() {
        let comm = NoComm;
        let iface = Interface::from_elements(0, InterfaceRole::Master, [0usize]);
        let mut v = vec![1.0f64];
        let mut ic = InterfaceCommunicator::new(&comm);
        assert!(matches!(
            ic.send_data(&iface, &mut VectorCopyPolicy::new(&mut v)),
            Err(LayoutError::SelfInterface { rank: 0 })
        ));
    }

    #[test]
    fn empty_round_is_a_noop() {
        let comm = NoComm;
        let report = InterfaceCommunicator::new(&comm).communicate().unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.bytes_sent, 0);
    }

    #[test]
    fn raw_and_policy_chunks_share_a_message() {
        let world = ThreadComm::world(2);
        std::thread::scope(|s| {
            for comm in &world {
                s.spawn(move || {
                    let me = comm.rank();
                    let other = 1 - me;
                    let iface = Interface::from_elements(other, InterfaceRole::Master, [0usize, 1]);
                    let mut out = vec![me as u32 * 10, me as u32 * 10 + 1];
                    let mut into = vec![0u32; 2];

                    let mut ic = InterfaceCommunicator::new(comm);
                    ic.send_raw(other, Bytes::from(vec![me as u8])).unwrap();
                    ic.send_data(&iface, &mut VectorCopyPolicy::new(&mut out)).unwrap();
                    let ticket = ic.receive_raw(other).unwrap();
                    let mut policy = VectorCopyPolicy::new(&mut into);
                    ic.receive_data(&iface, &mut policy).unwrap();
                    let mut report = ic.communicate().unwrap();

                    assert!(report.is_consistent());
                    assert_eq!(&report.take_raw(ticket).unwrap()[..], &[other as u8]);
                    assert_eq!(into, vec![other as u32 * 10, other as u32 * 10 + 1]);
                });
            }
        });
    }

    /// Copies values but refuses at one of the layout hooks.
    struct RefusingHook<'a> {
        inner: VectorCopyPolicy<'a, u32>,
        refuse_begin: bool,
    }

    impl CommunicationPolicy<usize> for RefusingHook<'_> {
        fn required_buffer_size(&self, interface: &Interface<usize>) -> BufferSize {
            self.inner.required_buffer_size(interface)
        }

        fn collect(&mut self, buf: &mut BytesMut, interface: &Interface<usize>) -> bool {
            self.inner.collect(buf, interface)
        }

        fn extract(&mut self, buf: &mut Bytes, interface: &Interface<usize>) -> bool {
            self.inner.extract(buf, interface)
        }

        fn begin_layout_extraction(&mut self, _layout: &Layout<usize>) -> bool {
            !self.refuse_begin
        }

        fn end_layout_extraction(&mut self) -> bool {
            self.refuse_begin
        }
    }

    #[test]
    fn refused_extraction_hooks_are_reported() {
        for refuse_begin in [true, false] {
            let world = ThreadComm::world(2);
            std::thread::scope(|s| {
                for comm in &world {
                    s.spawn(move || {
                        let me = comm.rank();
                        let other = 1 - me;
                        let mut layout = Layout::new(InterfaceRole::Master);
                        layout.interface(other).push(0usize);
                        let mut values = vec![me as u32 + 1];
                        let mut policy = RefusingHook {
                            inner: VectorCopyPolicy::new(&mut values),
                            refuse_begin,
                        };

                        let mut ic = InterfaceCommunicator::new(comm);
                        ic.send_layout_data(&layout, &mut policy).unwrap();
                        ic.receive_layout_data(&layout, &mut policy).unwrap();
                        let report = ic.communicate().unwrap();
                        assert!(!report.is_consistent());
                        assert_eq!(report.extract_failures, vec![other]);

                        let mut ic = InterfaceCommunicator::with_options(
                            comm,
                            ExchangeOptions::with_tag(CommTag::new(0x99)).escalate(),
                        );
                        ic.send_layout_data(&layout, &mut policy).unwrap();
                        ic.receive_layout_data(&layout, &mut policy).unwrap();
                        assert_eq!(
                            ic.communicate().unwrap_err(),
                            LayoutError::Consistency {
                                neighbor: other,
                                failures: 1
                            }
                        );
                    });
                }
            });
        }
    }

    #[test]
    fn frame_count_mismatch_is_fatal() {
        let world = ThreadComm::world(2);
        std::thread::scope(|s| {
            s.spawn(|| {
                let mut ic = InterfaceCommunicator::new(&world[0]);
                ic.send_raw(1, Bytes::from_static(b"a")).unwrap();
                ic.send_raw(1, Bytes::from_static(b"b")).unwrap();
                ic.communicate().unwrap();
            });
            s.spawn(|| {
                let mut ic = InterfaceCommunicator::new(&world[1]);
                ic.receive_raw(0).unwrap();
                assert!(matches!(
                    ic.communicate(),
                    Err(LayoutError::MalformedMessage { neighbor: 0, .. })
                ));
            });
        });
    }
}
