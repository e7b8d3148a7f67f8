//! Scenario: a node with one populated feed syncs it to an empty peer via
//! GOset discovery followed by WANT/CHNK replication.

use tinyssb_integration_tests::{new_identity, run_until, TestNode};
use tinyssb_packet::PacketType;
use tinyssb_store::Store;
use tinyssb_types::FeedId;

#[test]
fn peer_with_empty_store_catches_up_to_front_seq_five() {
    let (fid, kp) = new_identity();

    let a_dir = tempfile::tempdir().expect("tempdir");
    let a_store = Store::open(a_dir.path()).expect("open store");
    a_store
        .mk_generic_log(fid, PacketType::Plain48, b"genesis", |m| kp.sign(m).to_bytes(), FeedId::ZERO, 0)
        .expect("genesis");

    for i in 1..5u8 {
        let (seq, mid) = a_store.front(&fid).expect("front");
        let payload = [i; 48];
        let pkt = tinyssb_packet::codec::encode_typed(&fid, seq + 1, &mid, PacketType::Plain48, &payload, |m| {
            kp.sign(m).to_bytes()
        })
        .expect("encode");
        a_store
            .append(&fid, &pkt.wire, |f, s, m| tinyssb_engine::engine::verify_by_fid(f, s, m))
            .expect("append");
    }
    assert_eq!(a_store.front(&fid).expect("front").0, 5);

    let a = TestNode::with_store(a_dir, a_store, &[fid]);
    let b = TestNode::empty();

    let nodes = [&a, &b];
    let rounds = run_until(&nodes, 40, || {
        b.store().front(&fid).map(|(seq, _)| seq).unwrap_or(0) == 5
    });

    assert!(rounds < 40, "peer did not converge within the round budget");
    assert_eq!(b.store().front(&fid).expect("front").0, 5);

    for seq in 1..=5u32 {
        let a_pkt = a.store().read(&fid, seq).expect("read a").expect("present a");
        let b_pkt = b.store().read(&fid, seq).expect("read b").expect("present b");
        assert_eq!(a_pkt.wire, b_pkt.wire);
    }
}
