mod util;
use util::*;

use mesh_layouts::algs::communicator::Communicator;
use mesh_layouts::algs::interface_comm::{ExchangeOptions, InterfaceCommunicator};
use mesh_layouts::layout::{InterfaceRole, LayoutMap, LevelKey};
use mesh_layouts::layout_error::LayoutError;
use mesh_layouts::policy::{SelectionFlagPolicy, SubsetConflict, SubsetIndexPolicy};
use mesh_layouts::topology::element::{ElementId, ElementKind};
use mesh_layouts::topology::global_id::GlobalIdRegistry;
use mesh_layouts::topology::subsets::{SelectionMap, SubsetMap};

const K: ElementKind = ElementKind::Vertex;

struct Rank {
    registry: GlobalIdRegistry,
    layouts: LayoutMap<LevelKey, ElementId>,
    elements: Vec<ElementId>,
}

/// Rank 0 masters (0,1), (0,2), (0,3) towards rank 1; rank 1 holds them as slaves.
fn setup(rank: usize) -> Rank {
    let ids = [gid(0, 1), gid(0, 2), gid(0, 3)];
    let mut registry = GlobalIdRegistry::new(rank);
    let elements = elements_with_ids(&mut registry, K, 100 * rank as u64, &ids);
    let mut layouts = LayoutMap::new();
    let key = if rank == 0 {
        LevelKey::master(0)
    } else {
        LevelKey::slave(0)
    };
    let iface = layouts.get_layout(K, key).interface(1 - rank);
    for &e in &elements {
        iface.try_push(e).unwrap();
    }
    Rank {
        registry,
        layouts,
        elements,
    }
}

/// Run the subset exchange master → slave; returns rank 1's subsets,
/// conflicts and extract failures.
fn exchange_subsets(
    preset: Option<(usize, i32)>,
    options: ExchangeOptions,
) -> (Vec<Option<i32>>, Vec<SubsetConflict>, Result<Vec<usize>, LayoutError>) {
    let mut out = run_ranks(2, |comm| {
        let r = setup(comm.rank());
        let mut subsets = SubsetMap::new();
        if comm.rank() == 0 {
            for (&e, v) in r.elements.iter().zip([5, 7, 5]) {
                subsets.set(K, e, v);
            }
        } else if let Some((slot, v)) = preset {
            subsets.set(K, r.elements[slot], v);
        }

        let mut policy = SubsetIndexPolicy::new(&mut subsets, K).with_global_ids(&r.registry);
        let mut ic = InterfaceCommunicator::with_options(comm, options);
        if comm.rank() == 0 {
            let master = r.layouts.try_layout(K, &LevelKey::master(0)).unwrap();
            ic.send_layout_data(master, &mut policy).unwrap();
        } else {
            let slave = r.layouts.try_layout(K, &LevelKey::slave(0)).unwrap();
            ic.receive_layout_data(slave, &mut policy).unwrap();
        }
        let result = ic.communicate().map(|rep| rep.extract_failures);
        let conflicts = policy.take_conflicts();
        let values: Vec<_> = r.elements.iter().map(|&e| subsets.get(K, e)).collect();
        (values, conflicts, result)
    });
    out.swap_remove(1)
}

#[test]
fn subset_values_land_on_slave() {
    let (values, conflicts, result) = exchange_subsets(None, ExchangeOptions::default());
    assert_eq!(values, vec![Some(5), Some(7), Some(5)]);
    assert!(conflicts.is_empty());
    assert_eq!(result.unwrap(), Vec::<usize>::new());
}

#[test]
fn preset_subset_is_kept_and_reported() {
    let (values, conflicts, result) = exchange_subsets(Some((1, 9)), ExchangeOptions::default());
    assert_eq!(values, vec![Some(5), Some(9), Some(5)]);
    assert_eq!(result.unwrap(), vec![0]);
    assert_eq!(conflicts.len(), 1);
    let c = &conflicts[0];
    assert_eq!((c.partner, c.local, c.received), (0, 9, 7));
    assert_eq!(c.global_id, Some(gid(0, 2)));
}

#[test]
fn escalation_turns_conflict_into_error() {
    let (values, _, result) =
        exchange_subsets(Some((1, 9)), ExchangeOptions::default().escalate());
    assert_eq!(values[1], Some(9));
    assert_eq!(
        result.unwrap_err(),
        LayoutError::Consistency {
            neighbor: 0,
            failures: 1
        }
    );
}

#[test]
fn selection_flags_flow_both_ways() {
    let out = run_ranks(2, |comm| {
        let me = comm.rank();
        let r = setup(me);
        let mut selection = SelectionMap::new();
        selection.select(K, r.elements[me], 1 << me);
        let role = if me == 0 {
            InterfaceRole::Master
        } else {
            InterfaceRole::Slave
        };
        let layout = r
            .layouts
            .try_layout(K, &LevelKey { role, level: 0 })
            .unwrap();

        let mut send_policy = SelectionFlagPolicy::new(&mut selection, K);
        let mut incoming = SelectionMap::new();
        let mut ic = InterfaceCommunicator::new(comm);
        ic.send_layout_data(layout, &mut send_policy).unwrap();
        let mut recv_policy = SelectionFlagPolicy::new(&mut incoming, K);
        ic.receive_layout_data(layout, &mut recv_policy).unwrap();
        assert!(ic.communicate().unwrap().is_consistent());
        r.elements
            .iter()
            .map(|&e| incoming.flags(K, e))
            .collect::<Vec<_>>()
    });
    assert_eq!(out[0], vec![0, 0b10, 0]);
    assert_eq!(out[1], vec![0b01, 0, 0]);
}
