//! # Integration tests: Dispatcher driven through an in-memory network
//!
//! Mirrors `strata-transport/tests/integration.rs`'s "simulate the network
//! in memory" style: no real sockets or filesystem, just `Dispatcher::handle_request`
//! fed datagrams through a fake transport and a fake store, reproducing the
//! upload/download scenarios a real client/server pair would produce.
//!
//! Only `Dispatcher`'s genuinely public API is used here — `handle_request`,
//! `transport()`, `store()`, `session_count()`, `has_session()` — the same
//! surface a real accept loop (`filexfer-server`) drives.

use std::net::SocketAddr;

use filexfer_common::{Operation, Protocol, MAX_RETRIES};
use filexfer_transport::dispatcher::Dispatcher;
use filexfer_transport::socket::fake::FakeTransport;
use filexfer_transport::store::fake::FakeStore;
use filexfer_transport::wire::{self, PacketBody, PacketKind};

fn addr() -> SocketAddr {
    "127.0.0.1:9001".parse().unwrap()
}

fn server_addr() -> SocketAddr {
    "127.0.0.1:9090".parse().unwrap()
}

fn deliver_and_dispatch(
    dispatcher: &mut Dispatcher<FakeTransport, FakeStore>,
    bytes: &[u8],
    from: SocketAddr,
) {
    let packet = wire::decode(bytes).expect("test datagram decodes");
    dispatcher.handle_request(packet, from);
}

fn last_sent(transport: &FakeTransport) -> (Vec<u8>, SocketAddr) {
    transport.outbox.lock().unwrap().last().cloned().unwrap()
}

/// S1 — upload, Stop-and-Wait, clean.
#[test]
fn s1_upload_stop_wait_clean() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Upload, "a.bin"), client);
    assert_eq!(wire::decode(&last_sent(d.transport()).0).unwrap().kind, PacketKind::Ack);

    deliver_and_dispatch(&mut d, &wire::encode_data(0, b"hello"), client);
    assert_eq!(wire::decode(&last_sent(d.transport()).0).unwrap().sequence, 0);

    deliver_and_dispatch(&mut d, &wire::encode_data(1, b" world"), client);
    assert_eq!(wire::decode(&last_sent(d.transport()).0).unwrap().sequence, 1);

    deliver_and_dispatch(&mut d, &wire::encode_fin(0), client);
    assert_eq!(wire::decode(&last_sent(d.transport()).0).unwrap().kind, PacketKind::Ack);
    assert!(!d.has_session(&client));

    assert_eq!(d.store().contents_of("a.bin").unwrap(), b"hello world");
}

/// S2 — upload, Selective-Repeat, reordered.
#[test]
fn s2_upload_selective_repeat_reordered() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::SelectiveRepeat);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Upload, "abc.bin"), client);
    deliver_and_dispatch(&mut d, &wire::encode_data(1, b"B"), client);
    deliver_and_dispatch(&mut d, &wire::encode_data(0, b"A"), client);
    deliver_and_dispatch(&mut d, &wire::encode_data(2, b"C"), client);

    assert_eq!(d.store().contents_of("abc.bin").unwrap(), b"ABC");
    // Every Data chunk, in whatever order it arrived, was individually acked.
    for seq in [0u32, 1, 2] {
        deliver_and_dispatch(&mut d, &wire::encode_ack(seq), client);
    }
    assert!(d.has_session(&client), "session stays open until Fin");
}

/// S3 — upload with corruption.
#[test]
fn s3_upload_with_corruption_then_retransmit() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Upload, "x.bin"), client);

    let mut corrupted = wire::encode_data(0, b"X").to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    deliver_and_dispatch(&mut d, &corrupted, client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Nack);
    assert_eq!(decoded.sequence, 0);

    deliver_and_dispatch(&mut d, &wire::encode_data(0, b"X"), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Ack);
    assert_eq!(d.store().contents_of("x.bin").unwrap(), b"X");
}

/// S4 — download, Stop-and-Wait.
#[test]
fn s4_download_stop_wait() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    store.seed_with_read_limit("f", b"PQ".to_vec(), 1);
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Download, "f"), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Ack);
    assert_eq!(decoded.sequence, 0);

    // Client acks the Init response; server answers with the first chunk.
    deliver_and_dispatch(&mut d, &wire::encode_ack(0), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Data);
    assert_eq!(decoded.sequence, 1);
    assert_eq!(decoded.body, PacketBody::Data { payload: bytes::Bytes::from_static(b"P") });

    deliver_and_dispatch(&mut d, &wire::encode_ack(1), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Data);
    assert_eq!(decoded.sequence, 0);
    assert_eq!(decoded.body, PacketBody::Data { payload: bytes::Bytes::from_static(b"Q") });

    deliver_and_dispatch(&mut d, &wire::encode_ack(0), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Fin);
    assert!(!d.has_session(&client));
}

/// S5 — download, retry exhaustion.
#[test]
fn s5_download_retry_exhaustion() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    store.seed("f", b"chunk-one-bytes".to_vec());
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Download, "f"), client);
    deliver_and_dispatch(&mut d, &wire::encode_ack(0), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.sequence, 1);

    for _ in 0..MAX_RETRIES {
        deliver_and_dispatch(&mut d, &wire::encode_nack(1), client);
        let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
        assert_eq!(decoded.kind, PacketKind::Data);
        assert!(d.has_session(&client));
    }

    // The 11th NACK for the same sequence exhausts the retry budget.
    deliver_and_dispatch(&mut d, &wire::encode_nack(1), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Fin);
    assert!(!d.has_session(&client));
}

/// S6 — download, missing file.
#[test]
fn s6_download_missing_file() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Download, "missing"), client);
    let decoded = wire::decode(&last_sent(d.transport()).0).unwrap();
    assert_eq!(decoded.kind, PacketKind::Fin);
    assert!(!d.has_session(&client));

    // Subsequent packets from this peer are non-Init from an unknown peer.
    let before = d.transport().outbox.lock().unwrap().len();
    deliver_and_dispatch(&mut d, &wire::encode_ack(0), client);
    assert_eq!(d.transport().outbox.lock().unwrap().len(), before, "dropped silently");
}

/// Invariant: a corrupt packet's only effect is a single Nack to its source.
#[test]
fn checksum_gate_only_emits_nack() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::StopWait);
    let client = addr();

    let mut corrupted = wire::encode_ack(5).to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    deliver_and_dispatch(&mut d, &corrupted, client);

    assert_eq!(d.session_count(), 0);
    let (bytes, to) = last_sent(d.transport());
    assert_eq!(to, client);
    let decoded = wire::decode(&bytes).unwrap();
    assert_eq!(decoded.kind, PacketKind::Nack);
    assert_eq!(decoded.sequence, 5);
}

/// Invariant: session state for one peer is never touched by another peer's packets.
#[test]
fn session_isolation_across_peers() {
    let transport = FakeTransport::new(server_addr());
    let store = FakeStore::new();
    let mut d = Dispatcher::new(transport, store, Protocol::SelectiveRepeat);
    let a: SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let b: SocketAddr = "127.0.0.1:9002".parse().unwrap();

    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Upload, "a.bin"), a);
    deliver_and_dispatch(&mut d, &wire::encode_init(0, Operation::Upload, "b.bin"), b);
    deliver_and_dispatch(&mut d, &wire::encode_data(0, b"from-a"), a);
    deliver_and_dispatch(&mut d, &wire::encode_data(0, b"from-b"), b);

    assert_eq!(d.store().contents_of("a.bin").unwrap(), b"from-a");
    assert_eq!(d.store().contents_of("b.bin").unwrap(), b"from-b");
    assert!(d.has_session(&a));
    assert!(d.has_session(&b));
}
