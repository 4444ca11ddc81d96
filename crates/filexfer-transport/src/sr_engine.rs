//! Selective-Repeat (and, with a window of 1, Stop-and-Wait) sender engine.
//!
//! Owns the outstanding [`Window`] plus the per-sequence retry budget for a
//! single download-send session. Pure logic — no socket access — so it can
//! be driven directly from unit tests and from the dispatcher alike.
//!
//! ## Sequence numbering starts at 1 for downloads, 0 for uploads
//!
//! `Init`'s response is always `Ack(0)` (see `dispatcher.rs`), so on the
//! download-send side sequence 0 is already spent on the handshake before
//! any `Data` is sent — [`SrEngine::new`] starts its counter at
//! `protocol.next_seq(0)` to account for that (1, under either protocol).
//! This reproduces the reference download trace exactly: `Ack(0)` from the
//! client (acknowledging the server's `Ack(0)` to `Init`) is answered with
//! `Data(1, ...)`. The upload-send side has no such handshake to account
//! for, so the client binary constructs its engine with
//! [`SrEngine::new_at`]`(protocol, 0)` instead.
//!
//! ## Send-on-ACK contract
//!
//! [`SrEngine::send_chunk`] requires the window to have a free slot. The
//! dispatcher is the only caller, and it only ever sends one new chunk per
//! accepted ACK/NACK — since accepting an ACK frees at most one slot via
//! [`SrEngine::ack_received`], the precondition holds as long as the first
//! window was primed with exactly `capacity` chunks before any ACK arrives.
//! This mirrors the original reference sender, which reads and sends the
//! next chunk unconditionally on every accepted ACK rather than rechecking
//! whether the window has room.

use std::collections::HashMap;

use filexfer_common::{FileTransferError, Protocol, MAX_RETRIES};

use crate::window::Window;

/// Outcome of a NACK-driven retransmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    /// `sequence` is still held by the window; here is its payload to resend.
    Retransmit(Vec<u8>),
    /// The retry budget for `sequence` is exhausted; the session must be
    /// torn down (FIN sent, session removed) rather than retransmitted again.
    RetryBudgetExhausted,
    /// `sequence` is not in the window (already acked, or never sent); the
    /// caller should ignore the NACK.
    OutOfWindow,
}

pub struct SrEngine {
    protocol: Protocol,
    window: Window,
    next_seq: u32,
    retries: HashMap<u32, u8>,
}

impl SrEngine {
    /// Engine for the download-send direction: the server already spent
    /// sequence 0 acknowledging the client's `Init`, so the first `Data`
    /// this engine assigns is `protocol.next_seq(0)`.
    pub fn new(protocol: Protocol) -> Self {
        Self::new_at(protocol, protocol.next_seq(0))
    }

    /// Engine for the upload-send direction: there is no `Init`/`Ack(0)`
    /// handshake consuming a sequence number on this side, so the first
    /// `Data` sent is sequence 0 (see S1/S2's `DATA(0, ...)` traces).
    pub fn new_at(protocol: Protocol, start_seq: u32) -> Self {
        SrEngine {
            protocol,
            window: Window::new(protocol.window_size()),
            next_seq: start_seq,
            retries: HashMap::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.window.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn window_capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Assign the next sequence number to `payload`, record it in the
    /// window, and return `(sequence, payload)` for the caller to encode and
    /// send. Panics in debug builds if the window has no free slot — see
    /// the send-on-ack contract above.
    pub fn send_chunk(&mut self, payload: Vec<u8>) -> (u32, Vec<u8>) {
        debug_assert!(!self.window.is_full(), "send_chunk violates window capacity");
        let sequence = self.next_seq;
        self.next_seq = self.protocol.next_seq(sequence);
        self.window.insert(sequence, payload.clone());
        self.retries.remove(&sequence);
        (sequence, payload)
    }

    /// Accept an ACK for `sequence`. Returns `true` if it acknowledged a
    /// slot that was actually outstanding (freeing window capacity once the
    /// left edge is fully acked); `false` for a duplicate or out-of-window
    /// ACK, which this engine treats as a no-op exactly like the reference
    /// implementation does.
    pub fn ack_received(&mut self, sequence: u32) -> bool {
        let was_new = self.window.ack(sequence);
        if was_new {
            if let Some(left_edge) = self.window.first_seq() {
                if left_edge != sequence {
                    tracing::debug!(
                        sequence,
                        left_edge,
                        "ack is not the window's current left edge"
                    );
                }
            }
            self.window.advance();
            self.retries.remove(&sequence);
        }
        was_new
    }

    /// Record a retransmission attempt for `sequence` in response to a NACK
    /// or a retransmit timeout. Returns an error once the retry budget for
    /// that sequence is exhausted; the caller should tear the session down
    /// in that case.
    pub fn record_retry(&mut self, sequence: u32) -> Result<u8, FileTransferError> {
        let count = self.retries.entry(sequence).or_insert(0);
        if *count >= MAX_RETRIES {
            return Err(FileTransferError::RetryBudgetExhausted { sequence });
        }
        *count += 1;
        Ok(*count)
    }

    /// Respond to a NACK for `sequence`: bump its retry counter and return
    /// the payload to resend, or signal that the sequence is out of window
    /// or that its retry budget is spent.
    pub fn resend_package(&mut self, sequence: u32) -> ResendOutcome {
        if !self.window.contains(sequence) {
            return ResendOutcome::OutOfWindow;
        }
        match self.record_retry(sequence) {
            Ok(_) => {
                let payload = self
                    .window
                    .get(sequence)
                    .expect("contains() just confirmed this slot exists")
                    .payload
                    .clone();
                ResendOutcome::Retransmit(payload)
            }
            Err(_) => ResendOutcome::RetryBudgetExhausted,
        }
    }

    /// Payload for a sequence number still held in the window, for
    /// retransmission. `None` if it has already been acked and dropped.
    pub fn payload_for(&self, sequence: u32) -> Option<&[u8]> {
        self.window.get(sequence).map(|slot| slot.payload.as_slice())
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}
