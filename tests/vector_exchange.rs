mod util;
use util::*;

use mesh_layouts::algs::communicator::{CommTag, Communicator};
use mesh_layouts::algs::interface_comm::{ExchangeOptions, exchange_layout_data};
use mesh_layouts::algs::verify::verify_layouts;
use mesh_layouts::layout::{IndexLayout, InterfaceRole, add_entries_to_index_layout};
use mesh_layouts::layout_error::LayoutError;
use mesh_layouts::policy::{VectorAddPolicy, VectorCopyPolicy};
use mesh_layouts::topology::element::ElementKind;
use mesh_layouts::topology::global_id::IndexGlobalIds;

/// Rank 0 owns dof (0,0) at local index 0; ranks 1 and 2 hold slave copies.
fn layouts(rank: usize) -> (IndexLayout, IndexLayout, Vec<f64>, IndexGlobalIds) {
    let mut master = IndexLayout::new(InterfaceRole::Master);
    let mut slave = IndexLayout::new(InterfaceRole::Slave);
    let (values, ids) = match rank {
        0 => {
            add_entries_to_index_layout(&mut master, 1, [0]);
            add_entries_to_index_layout(&mut master, 2, [0]);
            (vec![1.0], vec![gid(0, 0)])
        }
        1 => {
            add_entries_to_index_layout(&mut slave, 0, [1]);
            (vec![0.5, 2.0], vec![gid(1, 0), gid(0, 0)])
        }
        _ => {
            add_entries_to_index_layout(&mut slave, 0, [0]);
            (vec![4.0], vec![gid(0, 0)])
        }
    };
    (master, slave, values, IndexGlobalIds::new(ids))
}

#[test]
fn add_to_master_then_copy_to_slaves() {
    let out = run_ranks(3, |comm| {
        let (master, slave, mut values, _) = layouts(comm.rank());
        let add = ExchangeOptions::with_tag(CommTag::new(0x2000));
        let copy = ExchangeOptions::with_tag(CommTag::new(0x2001));

        let report = exchange_layout_data(
            comm,
            &slave,
            &master,
            &mut VectorAddPolicy::new(&mut values),
            add,
        )
        .unwrap();
        assert!(report.is_consistent());
        exchange_layout_data(
            comm,
            &master,
            &slave,
            &mut VectorCopyPolicy::new(&mut values),
            copy,
        )
        .unwrap();
        values
    });
    assert_eq!(out[0], vec![7.0]);
    assert_eq!(out[1], vec![0.5, 7.0]);
    assert_eq!(out[2], vec![7.0]);
}

#[test]
fn verify_accepts_matching_layouts() {
    let out = run_ranks(3, |comm| {
        let (master, slave, _, ids) = layouts(comm.rank());
        verify_layouts(comm, &master, &slave, ElementKind::Vertex, &ids)
            .unwrap()
            .is_consistent()
    });
    assert_eq!(out, vec![true, true, true]);
}

#[test]
fn verify_reports_diverging_ids_on_both_sides() {
    let out = run_ranks(3, |comm| {
        let (master, slave, _, ids) = layouts(comm.rank());
        let ids = if comm.rank() == 2 {
            IndexGlobalIds::new(vec![gid(2, 9)])
        } else {
            ids
        };
        verify_layouts(comm, &master, &slave, ElementKind::Vertex, &ids)
            .unwrap()
            .mismatches
    });
    assert!(matches!(
        out[0][..],
        [LayoutError::InterfaceMismatch { partner: 2, .. }]
    ));
    assert!(out[1].is_empty());
    assert!(matches!(
        out[2][..],
        [LayoutError::InterfaceMismatch { partner: 0, .. }]
    ));
}

#[test]
fn verify_reports_one_sided_interface() {
    let out = run_ranks(2, |comm| {
        let mut master = IndexLayout::new(InterfaceRole::Master);
        let slave = IndexLayout::new(InterfaceRole::Slave);
        if comm.rank() == 0 {
            add_entries_to_index_layout(&mut master, 1, [0]);
        }
        let ids = IndexGlobalIds::new(vec![gid(comm.rank(), 0)]);
        verify_layouts(comm, &master, &slave, ElementKind::Vertex, &ids)
            .unwrap()
            .into_result()
    });
    assert!(out.iter().all(|r| r.is_err()));
}
