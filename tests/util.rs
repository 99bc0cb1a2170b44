#![allow(dead_code)]
use mesh_layouts::{
    algs::communicator::ThreadComm,
    topology::element::{ElementId, ElementKind},
    topology::global_id::{GlobalId, GlobalIdRegistry},
};

pub fn gid(owner: usize, seq: u64) -> GlobalId {
    GlobalId::new(owner, seq)
}

/// Run `f` once per rank of a fresh `n`-rank thread world; results in rank order.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&ThreadComm) -> R + Sync,
{
    let world = ThreadComm::world(n);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = world.iter().map(|comm| s.spawn(move || f(comm))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// Local elements `ElementId(base..)` of `kind` carrying the given global ids.
pub fn elements_with_ids(
    registry: &mut GlobalIdRegistry,
    kind: ElementKind,
    base: u64,
    ids: &[GlobalId],
) -> Vec<ElementId> {
    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            let e = ElementId::new(base + i as u64);
            registry.adopt(kind, e, id).unwrap();
            e
        })
        .collect()
}
