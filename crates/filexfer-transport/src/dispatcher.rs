//! Request handler — demultiplexes incoming packets to per-peer sessions and
//! drives the upload-receive, download-send, and finish state transitions.
//!
//! Mirrors `ServerRequestHandler.handle_request`'s dispatch-by-package-kind
//! shape: one gate for checksum validity, one gate for session lookup, then
//! a match on packet kind that fans out to a handful of private
//! `handle_*` methods, the same structure `ws_agent.rs`'s
//! `handle_agent_message` uses for its own message-type dispatch.

use std::collections::HashMap;
use std::net::SocketAddr;

use filexfer_common::{Operation, Protocol, MAX_PAYLOAD};

use crate::session::ClientSession;
use crate::socket::UdpTransport;
use crate::sr_engine::ResendOutcome;
use crate::store::Store;
use crate::wire::{self, DecodedPacket, PacketBody, PacketKind};

/// Demultiplexes datagrams by peer address and drives each peer's reliable-
/// delivery state machine. One instance serves every client connecting to a
/// given protocol (Stop-and-Wait or Selective-Repeat is a server-wide
/// choice, matching the original handler's single `self.protocol`).
pub struct Dispatcher<T, S> {
    transport: T,
    store: S,
    protocol: Protocol,
    sessions: HashMap<SocketAddr, ClientSession>,
}

impl<T: UdpTransport, S: Store> Dispatcher<T, S> {
    pub fn new(transport: T, store: S, protocol: Protocol) -> Self {
        Dispatcher {
            transport,
            store,
            protocol,
            sessions: HashMap::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, addr: &SocketAddr) -> bool {
        self.sessions.contains_key(addr)
    }

    /// Handle one `(packet, peer_addr)` pair delivered by the accept loop.
    pub fn handle_request(&mut self, packet: DecodedPacket, from: SocketAddr) {
        if !packet.valid {
            tracing::warn!(%from, sequence = packet.sequence, "invalid checksum; nacking");
            self.send_nack(from, packet.sequence);
            return;
        }

        if !self.sessions.contains_key(&from) {
            let PacketBody::Init { operation, filename } = &packet.body else {
                tracing::error!(%from, kind = ?packet.kind, "non-Init packet from unknown peer; dropping");
                return;
            };
            if !self.open_session(from, *operation, filename.clone()) {
                return;
            }
        }

        match packet.kind {
            PacketKind::Init => self.send_ack(from, 0),
            PacketKind::Data => self.handle_upload(from, packet.sequence, packet.body),
            PacketKind::Ack => self.handle_ack_or_nack(from, packet.sequence, true),
            PacketKind::Nack => self.handle_ack_or_nack(from, packet.sequence, false),
            PacketKind::Fin => self.handle_finish(from),
            PacketKind::Unknown(tag) => {
                tracing::error!(%from, tag, "unknown packet kind");
            }
        }
    }

    /// Instantiate a session for a newly-seen peer's `Init`. Returns `false`
    /// if the session was rejected (download of a nonexistent file), in
    /// which case the caller must not dispatch the triggering packet any
    /// further — a `Fin` has already been sent and no session exists.
    fn open_session(&mut self, from: SocketAddr, operation: Operation, filename: String) -> bool {
        let mut session = ClientSession::new(from, operation, self.protocol, filename.clone());

        if operation == Operation::Download {
            match self.store.open_for_download(&filename) {
                Ok(Some(reader)) => session.reader = Some(reader),
                Ok(None) => {
                    tracing::warn!(%from, filename, "download requested for nonexistent file");
                    self.send_fin(from);
                    return false;
                }
                Err(err) => {
                    tracing::error!(%from, filename, error = %err, "failed to open file for download");
                    self.send_fin(from);
                    return false;
                }
            }
        }

        tracing::info!(%from, ?operation, filename, protocol = %self.protocol, "new session");
        self.sessions.insert(from, session);
        true
    }

    /// Upload-receive path (§4.5): write in-order `Data`, buffer the rest.
    fn handle_upload(&mut self, from: SocketAddr, sequence: u32, body: PacketBody) {
        let PacketBody::Data { payload } = body else {
            // A valid packet whose kind is Data always decodes a Data body;
            // this is unreachable in practice.
            return;
        };

        let session = self
            .sessions
            .get_mut(&from)
            .expect("session exists — created or looked up before dispatch");

        if sequence == session.expected_seq {
            if let Err(err) = self.store.append(&session.filename, &payload) {
                tracing::error!(%from, error = %err, "failed to append upload chunk");
            }
            session.stats.record_received(payload.len());
            session.advance_expected();

            let protocol = session.protocol;
            let drained = session
                .reorder
                .drain_contiguous(session.expected_seq, |seq| protocol.next_seq(seq));
            if let Some((last_seq, _)) = drained.last() {
                session.expected_seq = protocol.next_seq(*last_seq);
            }
            for (_, bytes) in &drained {
                if let Err(err) = self.store.append(&session.filename, bytes) {
                    tracing::error!(%from, error = %err, "failed to append drained upload chunk");
                }
            }
        } else {
            session.reorder.insert(sequence, payload.to_vec());
        }

        self.send_ack(from, sequence);
    }

    /// Routes `Ack`/`Nack` to the download-send path, ignoring them on an
    /// uploading session (§4.4 dispatch table).
    fn handle_ack_or_nack(&mut self, from: SocketAddr, sequence: u32, is_ack: bool) {
        let Some(session) = self.sessions.get(&from) else {
            return;
        };
        if session.operation != Operation::Download {
            tracing::debug!(%from, "ack/nack on an uploading session ignored");
            return;
        }

        // The very first ACK/NACK for a download session is always the
        // client acknowledging the `Init` response, not a reply to any
        // `Data` the engine has sent yet — so the window is still empty and
        // `ack_received`/`resend_package` would find nothing to act on.
        // Priming sends exactly `window_capacity()` chunks: under
        // Stop-and-Wait that's the single first chunk (§4.6's "read next
        // chunk ... and send DATA" on the first ACK); under Selective-Repeat
        // it's the full first window.
        if !session.first_window_sent {
            self.sessions.get_mut(&from).unwrap().first_window_sent = true;
            self.prime_first_window(from);
            return;
        }

        if is_ack {
            self.handle_ack_download(from, sequence);
        } else {
            self.handle_nack_download(from, sequence);
        }
    }

    fn prime_first_window(&mut self, from: SocketAddr) {
        let capacity = self.sessions.get(&from).unwrap().engine.window_capacity();
        for _ in 0..capacity {
            if !self.sessions.contains_key(&from) {
                // send_next_chunk already tore the session down (EOF/error).
                break;
            }
            self.send_next_chunk(from);
        }
    }

    fn handle_ack_download(&mut self, from: SocketAddr, sequence: u32) {
        let session = self.sessions.get_mut(&from).expect("checked by caller");
        if !session.engine.ack_received(sequence) {
            // Out of window or a duplicate on an already-acked slot: no-op.
            return;
        }
        self.send_next_chunk(from);
    }

    fn handle_nack_download(&mut self, from: SocketAddr, sequence: u32) {
        let session = self.sessions.get_mut(&from).expect("checked by caller");
        match session.engine.resend_package(sequence) {
            ResendOutcome::Retransmit(payload) => {
                session.stats.record_retransmission();
                self.transport
                    .send_to(&wire::encode_data(sequence, &payload), from)
                    .ok();
            }
            ResendOutcome::RetryBudgetExhausted => {
                tracing::warn!(%from, sequence, "retry budget exhausted; tearing down session");
                self.send_fin(from);
                self.sessions.remove(&from);
            }
            ResendOutcome::OutOfWindow => {
                tracing::debug!(%from, sequence, "nack for a sequence outside the window; ignored");
            }
        }
    }

    /// Read the next chunk from the session's source file and send it, or
    /// tear the session down on EOF/read error. Also used to prime a
    /// Selective-Repeat window one chunk at a time.
    fn send_next_chunk(&mut self, from: SocketAddr) {
        let session = self.sessions.get_mut(&from).expect("checked by caller");
        if session.engine.is_full() {
            return;
        }

        let reader = session
            .reader
            .as_mut()
            .expect("download session always has its reader opened at session creation");

        let mut buf = vec![0u8; MAX_PAYLOAD];
        let read = match std::io::Read::read(reader, &mut buf) {
            Ok(n) => n,
            Err(err) => {
                tracing::error!(%from, error = %err, "read error on download source; finishing");
                self.send_fin(from);
                self.sessions.remove(&from);
                return;
            }
        };

        if read == 0 {
            tracing::info!(%from, "file transfer finished");
            self.send_fin(from);
            self.sessions.remove(&from);
            return;
        }
        buf.truncate(read);

        let (sequence, payload) = session.engine.send_chunk(buf);
        session.stats.record_sent(payload.len());
        self.transport.send_to(&wire::encode_data(sequence, &payload), from).ok();
    }

    /// Finish path (§4.7): ack the peer's `Fin`, drop the session (closing
    /// any open file handle as a side effect of the session being dropped).
    fn handle_finish(&mut self, from: SocketAddr) {
        tracing::info!(%from, "file transfer finished from peer Fin");
        self.send_ack(from, 0);
        self.sessions.remove(&from);
    }

    fn send_ack(&self, to: SocketAddr, sequence: u32) {
        self.transport.send_to(&wire::encode_ack(sequence), to).ok();
    }

    fn send_nack(&self, to: SocketAddr, sequence: u32) {
        self.transport.send_to(&wire::encode_nack(sequence), to).ok();
    }

    fn send_fin(&self, to: SocketAddr) {
        self.transport.send_to(&wire::encode_fin(0), to).ok();
    }
}
