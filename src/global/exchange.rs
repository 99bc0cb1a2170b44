//! Shipping global layouts between ranks.
//!
//! One message per partner carries a master global layout followed by a
//! slave global layout. Registration goes through an
//! [`InterfaceCommunicator`], so global layouts travel in the same round as
//! any other transfer registered with it.

use std::collections::BTreeMap;

use bytes::{Buf, BytesMut};

use crate::algs::communicator::Communicator;
use crate::algs::interface_comm::{
    CommunicationReport, ExchangeOptions, InterfaceCommunicator, RawTicket,
};
use crate::global::global_layout::{
    GlobalLayout, deserialize_and_add_global_layout, serialize_global_layout,
};
use crate::layout_error::LayoutError;

/// Pending receive of a master/slave global layout pair.
#[derive(Copy, Clone, Debug)]
#[must_use = "redeem the ticket after communicate()"]
pub struct GlobalLayoutTicket {
    source: usize,
    ticket: RawTicket,
}

impl GlobalLayoutTicket {
    pub fn source(&self) -> usize {
        self.source
    }

    /// Append the received pair to `master` and `slave`.
    pub fn unpack(
        self,
        report: &mut CommunicationReport,
        master: &mut GlobalLayout,
        slave: &mut GlobalLayout,
    ) -> Result<(), LayoutError> {
        let mut buf = report
            .take_raw(self.ticket)
            .ok_or_else(|| LayoutError::CommError {
                neighbor: self.source,
                reason: "global layout was not received in this round".into(),
            })?;
        deserialize_and_add_global_layout(&mut buf, master, self.source)?;
        deserialize_and_add_global_layout(&mut buf, slave, self.source)?;
        if buf.has_remaining() {
            return Err(LayoutError::MalformedMessage {
                neighbor: self.source,
                reason: format!("{} bytes after global layout pair", buf.remaining()),
            });
        }
        Ok(())
    }
}

/// Register `master` then `slave` for `target`.
pub fn send_global_layout<C: Communicator + ?Sized>(
    ic: &mut InterfaceCommunicator<'_, C>,
    target: usize,
    master: &GlobalLayout,
    slave: &GlobalLayout,
) -> Result<(), LayoutError> {
    let mut buf = BytesMut::new();
    serialize_global_layout(&mut buf, master);
    serialize_global_layout(&mut buf, slave);
    ic.send_raw(target, buf.freeze())
}

/// Register the receive of a master/slave pair from `source`.
pub fn receive_global_layout<C: Communicator + ?Sized>(
    ic: &mut InterfaceCommunicator<'_, C>,
    source: usize,
) -> Result<GlobalLayoutTicket, LayoutError> {
    let ticket = ic.receive_raw(source)?;
    Ok(GlobalLayoutTicket { source, ticket })
}

/// One round sending `outgoing[target] = (master, slave)` and receiving a
/// pair from every rank in `sources`.
///
/// Received pairs are appended in ascending source order and returned as
/// `(master, slave)`.
pub fn exchange_global_layouts<C: Communicator + ?Sized>(
    comm: &C,
    outgoing: &BTreeMap<usize, (GlobalLayout, GlobalLayout)>,
    sources: &[usize],
    options: ExchangeOptions,
) -> Result<(GlobalLayout, GlobalLayout), LayoutError> {
    let mut ic = InterfaceCommunicator::with_options(comm, options);
    for (&target, (master, slave)) in outgoing {
        send_global_layout(&mut ic, target, master, slave)?;
    }
    let mut tickets = sources
        .iter()
        .map(|&src| receive_global_layout(&mut ic, src))
        .collect::<Result<Vec<_>, _>>()?;
    tickets.sort_by_key(GlobalLayoutTicket::source);

    let mut report = ic.communicate()?;
    let mut master = GlobalLayout::new();
    let mut slave = GlobalLayout::new();
    for t in tickets {
        t.unpack(&mut report, &mut master, &mut slave)?;
    }
    log::debug!(
        "rank {}: received global layouts from {} rank(s), {} master / {} slave entries",
        comm.rank(),
        sources.len(),
        master.num_entries(),
        slave.num_entries()
    );
    Ok((master, slave))
}
