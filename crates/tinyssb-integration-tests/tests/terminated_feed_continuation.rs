//! Scenario: a feed is terminated with `contdas`/`iscontn` into a successor
//! feed; a peer that syncs the terminated feed picks up the successor too.

use tinyssb_integration_tests::{new_identity, run_until, TestNode};
use tinyssb_packet::PacketType;
use tinyssb_store::Store;
use tinyssb_types::FeedId;

#[test]
fn peer_follows_contdas_into_the_successor_feed() {
    let (f1, kp1) = new_identity();
    let (f2, kp2) = new_identity();

    let a_dir = tempfile::tempdir().expect("tempdir");
    let a_store = Store::open(a_dir.path()).expect("open store");
    a_store
        .mk_generic_log(f1, PacketType::Plain48, b"hello", |m| kp1.sign(m).to_bytes(), FeedId::ZERO, 0)
        .expect("genesis f1");
    a_store
        .mk_continuation_log(
            f1,
            |m| kp1.sign(m).to_bytes(),
            f2,
            |m| kp2.sign(m).to_bytes(),
            |f, s, m| tinyssb_engine::engine::verify_by_fid(f, s, m),
        )
        .expect("mk_continuation_log");
    // f2 gets one more real entry after its genesis.
    let (seq, mid) = a_store.front(&f2).expect("front f2");
    let pkt = tinyssb_packet::codec::encode_typed(&f2, seq + 1, &mid, PacketType::Plain48, b"continued", |m| {
        kp2.sign(m).to_bytes()
    })
    .expect("encode");
    a_store
        .append(&f2, &pkt.wire, |f, s, m| tinyssb_engine::engine::verify_by_fid(f, s, m))
        .expect("append f2 seq2");

    let a = TestNode::with_store(a_dir, a_store, &[f1, f2]);
    let b = TestNode::empty();
    let nodes = [&a, &b];

    let rounds = run_until(&nodes, 60, || {
        b.store().front(&f2).map(|(seq, _)| seq).unwrap_or(0) == 2
    });
    assert!(rounds < 60, "peer never synced past the terminated feed into its successor");

    assert_eq!(b.store().front(&f1).expect("front f1").0, 2);
    assert_eq!(b.store().front(&f2).expect("front f2").0, 2);

    let a_f2_genesis = a.store().read(&f2, 1).expect("read").expect("present");
    let b_f2_genesis = b.store().read(&f2, 1).expect("read").expect("present");
    assert_eq!(a_f2_genesis.typ, PacketType::IsContn);
    assert_eq!(a_f2_genesis.wire, b_f2_genesis.wire);
}
