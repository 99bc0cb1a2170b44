//! Human-readable dumps of index layouts.
//!
//! Best effort: nothing here fails or changes a layout.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::algs::communicator::Communicator;
use crate::layout::index_layout::IndexLayout;

/// Describe `layout`: role, partners, interface sizes and optionally the
/// raw indices. The text is logged at `info` level and returned.
pub fn log_index_layout(layout: &IndexLayout, print_indices: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} index layout: {} interface(s), {} entries",
        layout.role(),
        layout.num_interfaces(),
        layout.num_elements()
    );
    for (partner, iface) in layout.iter() {
        let _ = write!(out, "  to {partner}: size {}", iface.len());
        if print_indices {
            let _ = write!(out, " [{}]", iface.iter().join(", "));
        }
        out.push('\n');
    }
    log::info!("{}", out.trim_end());
    out
}

/// [`log_index_layout`] on every rank, one rank after another.
///
/// Collective: all ranks must call it. Barriers separate the per-rank
/// blocks so the output of different ranks does not interleave.
pub fn log_index_layout_on_all_procs<C>(comm: &C, layout: &IndexLayout, print_indices: bool)
where
    C: Communicator + ?Sized,
{
    comm.barrier();
    for r in 0..comm.size() {
        if r == comm.rank() {
            log::info!("rank {r} of {}:", comm.size());
            log_index_layout(layout, print_indices);
        }
        comm.barrier();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::layout::index_layout::add_entries_to_index_layout;
    use crate::layout::interface::InterfaceRole;

    #[test]
    fn dump_lists_partners_and_indices() {
        let mut l = IndexLayout::new(InterfaceRole::Slave);
        add_entries_to_index_layout(&mut l, 2, [4, 1]);
        l.interface(5);
        let text = log_index_layout(&l, true);
        assert!(text.starts_with("slave index layout: 2 interface(s), 2 entries"));
        assert!(text.contains("to 2: size 2 [4, 1]"));
        assert!(text.contains("to 5: size 0 []"));
        assert!(!log_index_layout(&l, false).contains('['));
        log_index_layout_on_all_procs(&NoComm, &l, false);
    }
}
