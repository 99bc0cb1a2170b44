mod util;
use util::*;

use bytes::Bytes;
use mesh_layouts::algs::communicator::{CommTag, Communicator, ThreadComm, Wait};
use mesh_layouts::layout_error::LayoutError;

#[test]
fn fifo_order_per_source_and_tag() {
    let world = ThreadComm::world(2);
    for i in 0..10u8 {
        world[0].isend(1, 5, &[i]);
    }
    let got: Vec<u8> = (0..10)
        .map(|_| world[1].irecv(0, 5).wait().unwrap()[0])
        .collect();
    assert_eq!(got, (0u8..10).collect::<Vec<_>>());
}

#[test]
fn tags_do_not_mix() {
    let world = ThreadComm::world(2);
    world[0].isend(1, 0xA1, b"a");
    world[0].isend(1, 0xB2, b"b");
    assert_eq!(world[1].irecv(0, 0xB2).wait().unwrap(), b"b".to_vec());
    assert_eq!(world[1].irecv(0, 0xA1).wait().unwrap(), b"a".to_vec());
}

#[test]
fn ring_exchange_rounds() {
    let out = run_ranks(4, |comm| {
        let n = comm.size();
        let me = comm.rank();
        let right = (me + 1) % n;
        let left = (me + n - 1) % n;
        let mut seen = Vec::new();
        for round in 0..3u16 {
            let payload = Bytes::from(vec![me as u8, round as u8]);
            let got = comm
                .exchange(CommTag::new(0x300).offset(round), vec![(right, payload)], &[left])
                .unwrap();
            seen.push(got[&left].to_vec());
        }
        seen
    });
    for (me, seen) in out.iter().enumerate() {
        let left = (me + 3) % 4;
        assert_eq!(seen, &vec![vec![left as u8, 0], vec![left as u8, 1], vec![left as u8, 2]]);
    }
}

#[test]
fn out_of_range_peer_is_rejected() {
    let world = ThreadComm::world(2);
    assert_eq!(
        world[0].exchange(CommTag::new(1), vec![(2, Bytes::new())], &[]),
        Err(LayoutError::RankOutOfRange { rank: 2, size: 2 })
    );
}

#[test]
fn failed_round_posts_nothing() {
    let world = ThreadComm::world(2);
    let tag = CommTag::new(0x77);
    let bad = vec![
        (1, Bytes::from_static(b"stale")),
        (5, Bytes::from_static(b"")),
    ];
    assert!(matches!(
        world[0].exchange(tag, bad, &[]),
        Err(LayoutError::RankOutOfRange { rank: 5, size: 2 })
    ));
    assert!(matches!(
        world[1].exchange(tag, vec![], &[0, 9]),
        Err(LayoutError::RankOutOfRange { rank: 9, size: 2 })
    ));

    world[0]
        .exchange(tag, vec![(1, Bytes::from_static(b"fresh"))], &[])
        .unwrap();
    let got = world[1].exchange(tag, vec![], &[0]).unwrap();
    assert_eq!(&got[&0][..], b"fresh");
}
