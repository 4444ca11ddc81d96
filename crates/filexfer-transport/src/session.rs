//! Per-peer session state.
//!
//! One `ClientSession` exists per `SocketAddr` that has sent an `Init`
//! packet, for the lifetime of that transfer. It bundles whichever
//! direction-specific state the session's [`Operation`] actually needs:
//! an upload session only ever touches `expected_seq`/`reorder`, a download
//! session only ever touches `engine`/`reader`. Keeping both on one struct
//! (rather than an enum of two session types) mirrors the single
//! `ClientInfo`-style record the dispatcher looked up by peer address in
//! the reference implementation.

use std::io::Read;
use std::net::SocketAddr;

use filexfer_common::{Operation, Protocol};

use crate::reorder::ReorderBuffer;
use crate::sr_engine::SrEngine;
use crate::stats::SessionStats;

pub struct ClientSession {
    pub peer_addr: SocketAddr,
    pub operation: Operation,
    pub protocol: Protocol,
    pub filename: String,
    pub stats: SessionStats,

    /// Upload (client → server): next sequence number expected in order.
    pub expected_seq: u32,
    /// Upload: buffer for chunks that arrived ahead of `expected_seq`.
    pub reorder: ReorderBuffer,

    /// Download (server → client): outstanding send window + retry budget.
    pub engine: SrEngine,
    /// Download: opened against the server storage at session creation —
    /// a missing file is rejected with `Fin` before the session ever exists
    /// (see `dispatcher.rs`), so by the time a session is live for a
    /// download, `reader` is always `Some`.
    pub reader: Option<Box<dyn Read + Send>>,
    /// Download: whether the first window of `Data` has been primed yet.
    /// The very first ACK/NACK a download session receives always
    /// acknowledges the `Init` response, not any `Data` sent so far, so the
    /// dispatcher primes `engine.window_capacity()` chunks on it regardless
    /// of protocol — 1 chunk under Stop-and-Wait, a full window under
    /// Selective-Repeat (see `dispatcher.rs`).
    pub first_window_sent: bool,
}

impl ClientSession {
    pub fn new(peer_addr: SocketAddr, operation: Operation, protocol: Protocol, filename: String) -> Self {
        ClientSession {
            peer_addr,
            operation,
            protocol,
            filename,
            stats: SessionStats::new(),
            expected_seq: 0,
            reorder: ReorderBuffer::new(),
            engine: SrEngine::new(protocol),
            reader: None,
            first_window_sent: false,
        }
    }

    /// Advance the upload-side expected sequence number by one protocol step.
    pub fn advance_expected(&mut self) {
        self.expected_seq = self.protocol.next_seq(self.expected_seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_sequence_zero() {
        let session = ClientSession::new(
            "127.0.0.1:9000".parse().unwrap(),
            Operation::Upload,
            Protocol::StopWait,
            "f.bin".to_owned(),
        );
        assert_eq!(session.expected_seq, 0);
        assert!(session.reorder.is_empty());
    }

    #[test]
    fn advance_expected_follows_protocol_sequence_space() {
        let mut sw = ClientSession::new(
            "127.0.0.1:9000".parse().unwrap(),
            Operation::Upload,
            Protocol::StopWait,
            "f.bin".to_owned(),
        );
        sw.advance_expected();
        assert_eq!(sw.expected_seq, 1);
        sw.advance_expected();
        assert_eq!(sw.expected_seq, 0);

        let mut sr = ClientSession::new(
            "127.0.0.1:9000".parse().unwrap(),
            Operation::Upload,
            Protocol::SelectiveRepeat,
            "f.bin".to_owned(),
        );
        sr.advance_expected();
        sr.advance_expected();
        assert_eq!(sr.expected_seq, 2);
    }
}
