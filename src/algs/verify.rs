//! Cross-rank consistency check of master/slave layouts.
//!
//! Every rank sends every other rank the global ids of its master and slave
//! interfaces to it, then compares: its master interface to `p` must equal
//! `p`'s slave interface to it entry by entry, and vice versa. The round is
//! all-to-all so ranks whose partner sets disagree still meet.

use std::collections::BTreeMap;
use std::fmt;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::interface_comm::{ExchangeOptions, InterfaceCommunicator};
use crate::global::exchange::{receive_global_layout, send_global_layout};
use crate::global::global_layout::{GlobalLayout, create_global_layout};
use crate::layout::interface::InterfaceRole;
use crate::layout::layout::Layout;
use crate::layout_error::LayoutError;
use crate::topology::element::ElementKind;
use crate::topology::global_id::{GlobalId, GlobalIdLookup};

/// Default tag of verification rounds.
pub const VERIFY_TAG: CommTag = CommTag::new(0x5646);

/// Result of [`verify_layouts`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutVerification {
    /// One [`LayoutError::InterfaceMismatch`] per disagreeing interface pair.
    pub mismatches: Vec<LayoutError>,
}

impl LayoutVerification {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// First mismatch as an error.
    pub fn into_result(self) -> Result<(), LayoutError> {
        match self.mismatches.into_iter().next() {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

fn compare(
    partner: usize,
    mine_role: InterfaceRole,
    mine: &[GlobalId],
    theirs: &[GlobalId],
) -> Option<LayoutError> {
    if mine.len() != theirs.len() {
        return Some(LayoutError::InterfaceMismatch {
            partner,
            reason: format!(
                "local {mine_role} interface has {} entries, partner {} interface has {}",
                mine.len(),
                mine_role.opposite(),
                theirs.len()
            ),
        });
    }
    let pos = mine.iter().zip(theirs).position(|(a, b)| a != b)?;
    Some(LayoutError::InterfaceMismatch {
        partner,
        reason: format!(
            "{mine_role} entry {pos}: local {} vs partner {}",
            mine[pos], theirs[pos]
        ),
    })
}

/// Check `master` and `slave` of `kind` against every other rank.
///
/// Collective: every rank of `comm` must call it. Fails with
/// [`LayoutError::MissingGlobalId`] if a local element has no global id.
pub fn verify_layouts<C, E, L>(
    comm: &C,
    master: &Layout<E>,
    slave: &Layout<E>,
    kind: ElementKind,
    lookup: &L,
) -> Result<LayoutVerification, LayoutError>
where
    C: Communicator + ?Sized,
    E: fmt::Debug,
    L: GlobalIdLookup<E> + ?Sized,
{
    let me = comm.rank();
    let my_master = create_global_layout(master, kind, lookup)?;
    let my_slave = create_global_layout(slave, kind, lookup)?;

    let mut report = LayoutVerification::default();
    for partner in my_master.partners().chain(my_slave.partners()) {
        if partner == me {
            report.mismatches.push(LayoutError::SelfInterface { rank: me });
        } else if comm.check_rank(partner).is_err() {
            report.mismatches.push(LayoutError::InterfaceMismatch {
                partner,
                reason: format!("partner outside communicator of size {}", comm.size()),
            });
        }
    }

    let pick = |g: &GlobalLayout, p: usize| {
        let mut one = GlobalLayout::new();
        if let Some(ids) = g.get(p) {
            one.interface_mut(p).extend_from_slice(ids);
        }
        one
    };
    let others: Vec<usize> = (0..comm.size()).filter(|&p| p != me).collect();
    let outgoing: BTreeMap<usize, (GlobalLayout, GlobalLayout)> = others
        .iter()
        .map(|&p| (p, (pick(&my_master, p), pick(&my_slave, p))))
        .collect();

    // received entries are keyed by our own rank on the sender's side
    let mut theirs_master: BTreeMap<usize, Vec<GlobalId>> = BTreeMap::new();
    let mut theirs_slave: BTreeMap<usize, Vec<GlobalId>> = BTreeMap::new();
    let options = ExchangeOptions::with_tag(VERIFY_TAG);
    let received = exchange_per_source(comm, &outgoing, &others, options)?;
    for (p, (m, s)) in received {
        if let Some(ids) = m.get(me) {
            theirs_master.insert(p, ids.to_vec());
        }
        if let Some(ids) = s.get(me) {
            theirs_slave.insert(p, ids.to_vec());
        }
    }

    for &p in &others {
        let mine_m = my_master.get(p).unwrap_or(&[]);
        let mine_s = my_slave.get(p).unwrap_or(&[]);
        let their_s = theirs_slave.get(&p).map_or(&[][..], Vec::as_slice);
        let their_m = theirs_master.get(&p).map_or(&[][..], Vec::as_slice);
        report
            .mismatches
            .extend(compare(p, InterfaceRole::Master, mine_m, their_s));
        report
            .mismatches
            .extend(compare(p, InterfaceRole::Slave, mine_s, their_m));
    }

    if report.is_consistent() {
        log::debug!("rank {me}: {kind} layouts verified against {} rank(s)", others.len());
    } else {
        for m in &report.mismatches {
            log::warn!("rank {me}: {kind} layout check: {m}");
        }
    }
    Ok(report)
}

/// Like [`exchange_global_layouts`](crate::global::exchange_global_layouts),
/// but keeps the pairs of different sources apart.
fn exchange_per_source<C: Communicator + ?Sized>(
    comm: &C,
    outgoing: &BTreeMap<usize, (GlobalLayout, GlobalLayout)>,
    sources: &[usize],
    options: ExchangeOptions,
) -> Result<BTreeMap<usize, (GlobalLayout, GlobalLayout)>, LayoutError> {
    let mut ic = InterfaceCommunicator::with_options(comm, options);
    for (&target, (m, s)) in outgoing {
        send_global_layout(&mut ic, target, m, s)?;
    }
    let tickets = sources
        .iter()
        .map(|&src| receive_global_layout(&mut ic, src))
        .collect::<Result<Vec<_>, _>>()?;
    let mut report = ic.communicate()?;
    let mut out = BTreeMap::new();
    for t in tickets {
        let (mut m, mut s) = (GlobalLayout::new(), GlobalLayout::new());
        let src = t.source();
        t.unpack(&mut report, &mut m, &mut s)?;
        out.insert(src, (m, s));
    }
    Ok(out)
}
