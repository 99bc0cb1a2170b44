mod util;
use util::*;

use std::collections::BTreeMap;

use bytes::BytesMut;
use mesh_layouts::algs::communicator::Communicator;
use mesh_layouts::algs::interface_comm::ExchangeOptions;
use mesh_layouts::global::{
    GlobalLayout, build_layout_from_global_layout, create_global_layout,
    deserialize_and_add_global_layout, exchange_global_layouts, merge_global_layout,
    serialize_global_layout,
};
use mesh_layouts::layout::{InterfaceRole, Layout};
use mesh_layouts::topology::element::{ElementId, ElementKind};
use mesh_layouts::topology::global_id::GlobalIdRegistry;
use proptest::prelude::*;

fn sample() -> GlobalLayout {
    let mut g = GlobalLayout::new();
    g.interface_mut(1).extend([gid(0, 4), gid(0, 2)]);
    g.interface_mut(3).extend([gid(3, 0)]);
    g.interface_mut(7);
    g
}

#[test]
fn serialize_into_empty_target_reproduces_layout() {
    let g = sample();
    let mut out = BytesMut::new();
    serialize_global_layout(&mut out, &g);
    let mut back = GlobalLayout::new();
    deserialize_and_add_global_layout(&mut out.freeze(), &mut back, 1).unwrap();
    assert_eq!(back, g);
    assert!(back.contains_partner(7));
}

#[test]
fn snapshot_serde_json_and_bincode() {
    let g = sample();
    let json = serde_json::to_string(&g).unwrap();
    let from_json: GlobalLayout = serde_json::from_str(&json).unwrap();
    assert_eq!(from_json, g);

    let bin = bincode::serialize(&g).unwrap();
    let from_bin: GlobalLayout = bincode::deserialize(&bin).unwrap();
    assert_eq!(from_bin, g);
}

#[test]
fn merge_rename_to_other_and_to_self() {
    let mut g = sample();
    let before_1 = g.get(1).unwrap().to_vec();
    let before_3 = g.get(3).unwrap().to_vec();
    merge_global_layout(&mut g, &[(3, 1), (7, 0)], 0);
    assert!(!g.contains_partner(3));
    assert!(!g.contains_partner(7));
    assert!(!g.contains_partner(0));
    let expect: Vec<_> = before_1.iter().chain(&before_3).copied().collect();
    assert_eq!(g.get(1).unwrap(), &expect[..]);
}

/// Rank 2 hands its elements to rank 1. Rank 0 keeps its master interface,
/// now pointing at rank 1, and rank 1 rebuilds the matching slave interface
/// from global ids alone.
#[test]
fn redistribution_rebuilds_interfaces_from_global_ids() {
    let shared = [gid(0, 0), gid(0, 1), gid(0, 2)];
    let out = run_ranks(3, |comm| {
        let me = comm.rank();
        let mut reg = GlobalIdRegistry::new(me);
        let kind = ElementKind::Vertex;
        match me {
            0 => {
                let elems = elements_with_ids(&mut reg, kind, 0, &shared);
                let mut master = Layout::new(InterfaceRole::Master);
                for &e in &elems {
                    master.interface(2).push(e);
                }
                let mut global = create_global_layout(&master, kind, &reg.view(kind)).unwrap();
                merge_global_layout(&mut global, &[(2, 1)], me);
                let rebuilt: Layout<ElementId> =
                    build_layout_from_global_layout(&global, InterfaceRole::Master, &reg.view(kind))
                        .unwrap();
                rebuilt.get(1).unwrap().len()
            }
            2 => {
                // ship our slave view, keyed by the master rank, to the new owner
                let mut slave = GlobalLayout::new();
                slave.interface_mut(0).extend(shared);
                let outgoing = BTreeMap::from([(1, (GlobalLayout::new(), slave))]);
                exchange_global_layouts(comm, &outgoing, &[], ExchangeOptions::default())
                    .unwrap();
                0
            }
            _ => {
                // rank 1 creates its own copies of the migrated elements
                let (_, slave) = exchange_global_layouts(
                    comm,
                    &BTreeMap::new(),
                    &[2],
                    ExchangeOptions::default(),
                )
                .unwrap();
                elements_with_ids(&mut reg, kind, 50, &shared);
                let layout: Layout<ElementId> =
                    build_layout_from_global_layout(&slave, InterfaceRole::Slave, &reg.view(kind))
                        .unwrap();
                let iface = layout.get(0).unwrap();
                iface
                    .iter()
                    .map(|&e| reg.global_id(kind, e).unwrap().local_seq as usize)
                    .sum::<usize>()
                    + 100 * iface.len()
            }
        }
    });
    assert_eq!(out, vec![3, 303, 0]);
}

proptest! {
    #[test]
    fn merge_postconditions(
        entries in prop::collection::btree_map(0usize..6, prop::collection::vec(0u64..20, 0..5), 0..6),
        old in 0usize..6,
        new in 0usize..6,
        me in 0usize..6,
    ) {
        let mut g = GlobalLayout::new();
        for (&p, seqs) in &entries {
            g.interface_mut(p).extend(seqs.iter().map(|&s| gid(p, s)));
        }
        let pre_old = g.get(old).map(<[_]>::to_vec).unwrap_or_default();
        let pre_new = g.get(new).map(<[_]>::to_vec).unwrap_or_default();
        let total_before = g.num_entries();
        merge_global_layout(&mut g, &[(old, new)], me);

        prop_assert!(!g.contains_partner(me));
        if old != new {
            prop_assert!(!g.contains_partner(old));
        }
        if new != me && old != new {
            let merged = g.get(new).map(<[_]>::to_vec).unwrap_or_default();
            prop_assert_eq!(&merged[..pre_new.len()], &pre_new[..]);
            prop_assert_eq!(&merged[pre_new.len()..], &pre_old[..]);
        }
        if old == new && old != me {
            let kept = g.get(old).map(<[_]>::to_vec).unwrap_or_default();
            prop_assert_eq!(kept, pre_old);
        }
        prop_assert!(g.num_entries() <= total_before);
    }
}
