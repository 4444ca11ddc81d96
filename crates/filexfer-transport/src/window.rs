//! Fixed-capacity send window.
//!
//! Tracks which sequence numbers within the current window have been sent
//! and which have been acknowledged, and how many chunks beyond the window's
//! left edge the file has already yielded. Capacity is 1 for Stop-and-Wait
//! and 5 for Selective-Repeat; both protocols use the same structure since
//! the only real difference between them is this one number.

use std::collections::BTreeMap;

/// A single outstanding, unacknowledged chunk.
#[derive(Debug, Clone)]
pub struct Slot {
    pub payload: Vec<u8>,
    pub acked: bool,
}

/// Sliding window of in-flight chunks, keyed by sequence number.
pub struct Window {
    capacity: usize,
    slots: BTreeMap<u32, Slot>,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be nonzero");
        Window {
            capacity,
            slots: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Insert a newly sent chunk. Caller must ensure the window is not full
    /// first — see the module-level send-on-ack contract in `sr_engine`.
    pub fn insert(&mut self, sequence: u32, payload: Vec<u8>) {
        debug_assert!(!self.is_full(), "inserted into a full window");
        self.slots.insert(sequence, Slot { payload, acked: false });
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.slots.contains_key(&sequence)
    }

    pub fn get(&self, sequence: u32) -> Option<&Slot> {
        self.slots.get(&sequence)
    }

    /// Mark a sequence number acknowledged. Returns `true` if it was a known,
    /// previously-unacked slot; `false` for a duplicate or unknown ACK, which
    /// is a no-op rather than an error.
    pub fn ack(&mut self, sequence: u32) -> bool {
        match self.slots.get_mut(&sequence) {
            Some(slot) if !slot.acked => {
                slot.acked = true;
                true
            }
            _ => false,
        }
    }

    /// Drop every fully-acked slot at the left edge of the window, freeing
    /// their capacity for new sends. Returns how many slots were freed.
    pub fn advance(&mut self) -> usize {
        let mut freed = 0;
        while let Some((&seq, slot)) = self.slots.iter().next() {
            if slot.acked {
                self.slots.remove(&seq);
                freed += 1;
            } else {
                break;
            }
        }
        freed
    }

    /// Lowest sequence number still held by the window, if any.
    pub fn first_seq(&self) -> Option<u32> {
        self.slots.keys().next().copied()
    }

    /// Highest sequence number still held by the window, if any.
    pub fn last_seq(&self) -> Option<u32> {
        self.slots.keys().next_back().copied()
    }

    /// Every currently-held, not-yet-acked sequence number, in order. Used to
    /// rebuild outbound traffic after a NACK or a retransmit timer fires.
    pub fn unacked_sequences(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|(_, slot)| !slot.acked)
            .map(|(&seq, _)| seq)
            .collect()
    }
}
