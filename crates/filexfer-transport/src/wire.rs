//! # filexfer wire format
//!
//! A flat, fixed-position header followed by a kind-specific body and a
//! trailing checksum — no varints, no optional fields. Every field in the
//! header is fixed width so a packet can be decoded (kind + sequence
//! number) even when its checksum does not validate; only the `valid` flag
//! and the body are suspect in that case.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Kind (8)   |                Sequence Number (32)           -
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! -              |       Extra Length (16)       |    Body ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Checksum (32, FNV-1a)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `Ack`, `Nack`, and `Fin` carry no body; `extra_len` is zero. `Data`'s
//! body is `extra_len` raw payload bytes. `Init`'s body is one operation
//! tag byte followed by `extra_len - 1` filename bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use filexfer_common::Operation;

/// Largest on-wire datagram this codec will produce or accept.
pub const BUFSIZE: usize = filexfer_common::BUFSIZE;

/// Fixed header size: kind(1) + sequence(4) + extra_len(2).
pub const HEADER_LEN: usize = 7;

/// Trailing checksum size.
pub const CHECKSUM_LEN: usize = 4;

/// Largest `Data` payload that still fits within `BUFSIZE`.
pub const MAX_PAYLOAD_LEN: usize = BUFSIZE - HEADER_LEN - CHECKSUM_LEN;

/// The five packet kinds the service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Init,
    Data,
    Ack,
    Nack,
    Fin,
    /// A tag byte this codec does not recognize. Kept distinct from a decode
    /// failure so the dispatcher can still read the sequence number of a
    /// packet from a newer or unrelated protocol version and drop it quietly.
    Unknown(u8),
}

impl PacketKind {
    fn tag(self) -> u8 {
        match self {
            PacketKind::Init => 0,
            PacketKind::Data => 1,
            PacketKind::Ack => 2,
            PacketKind::Nack => 3,
            PacketKind::Fin => 4,
            PacketKind::Unknown(t) => t,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => PacketKind::Init,
            1 => PacketKind::Data,
            2 => PacketKind::Ack,
            3 => PacketKind::Nack,
            4 => PacketKind::Fin,
            other => PacketKind::Unknown(other),
        }
    }
}

/// The kind-specific payload of a decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    Init { operation: Operation, filename: String },
    Data { payload: Bytes },
    Ack,
    Nack,
    Fin,
    /// Body could not be interpreted (unknown kind, or checksum invalid so
    /// the body is not trusted). The header fields remain readable.
    Opaque,
}

/// A fully decoded packet.
///
/// `valid` reflects the checksum check; `sequence` and `kind` are read
/// directly off the header and are trustworthy even when `valid` is
/// `false` — this lets a receiver NACK the sequence number a corrupted
/// packet claimed, which is how the dispatcher can react to corruption at
/// all instead of silently dropping every bad datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub kind: PacketKind,
    pub sequence: u32,
    pub valid: bool,
    pub body: PacketBody,
}

impl DecodedPacket {
    pub fn is_data(&self) -> bool {
        matches!(self.kind, PacketKind::Data)
    }
}

/// Encode an `Init` packet.
pub fn encode_init(sequence: u32, operation: Operation, filename: &str) -> Bytes {
    let name_bytes = filename.as_bytes();
    let mut body = BytesMut::with_capacity(1 + name_bytes.len());
    body.put_u8(operation.tag());
    body.put_slice(name_bytes);
    encode_packet(PacketKind::Init, sequence, &body)
}

/// Encode a `Data` packet. `payload` must be at most `MAX_PAYLOAD_LEN` bytes.
pub fn encode_data(sequence: u32, payload: &[u8]) -> Bytes {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
    encode_packet(PacketKind::Data, sequence, payload)
}

/// Encode an `Ack` packet.
pub fn encode_ack(sequence: u32) -> Bytes {
    encode_packet(PacketKind::Ack, sequence, &[])
}

/// Encode a `Nack` packet.
pub fn encode_nack(sequence: u32) -> Bytes {
    encode_packet(PacketKind::Nack, sequence, &[])
}

/// Encode a `Fin` packet.
pub fn encode_fin(sequence: u32) -> Bytes {
    encode_packet(PacketKind::Fin, sequence, &[])
}

fn encode_packet(kind: PacketKind, sequence: u32, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len() + CHECKSUM_LEN);
    buf.put_u8(kind.tag());
    buf.put_u32(sequence);
    buf.put_u16(body.len() as u16);
    buf.put_slice(body);
    let checksum = fnv1a(&buf);
    buf.put_u32(checksum);
    buf.freeze()
}

/// Decode a datagram into a [`DecodedPacket`].
///
/// Returns `None` only when the buffer is too short to contain a header and
/// checksum at all — a structurally short or truncated datagram is simply
/// not a packet. A well-formed-but-corrupted packet instead decodes with
/// `valid = false`, per the header/body split documented on
/// [`DecodedPacket`].
pub fn decode(mut bytes: &[u8]) -> Option<DecodedPacket> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return None;
    }

    let total_len = bytes.len();
    let header_and_body = &bytes[..total_len - CHECKSUM_LEN];
    let claimed_checksum = u32::from_be_bytes(
        bytes[total_len - CHECKSUM_LEN..]
            .try_into()
            .expect("slice is exactly CHECKSUM_LEN"),
    );
    let valid = fnv1a(header_and_body) == claimed_checksum;

    let kind_tag = bytes.get_u8();
    let sequence = bytes.get_u32();
    let extra_len = bytes.get_u16() as usize;
    let kind = PacketKind::from_tag(kind_tag);

    let body_bytes_len = header_and_body.len() - HEADER_LEN;
    if extra_len != body_bytes_len || bytes.remaining() < body_bytes_len {
        // Declared length disagrees with what's actually in the datagram.
        return Some(DecodedPacket {
            kind,
            sequence,
            valid: false,
            body: PacketBody::Opaque,
        });
    }

    if !valid {
        return Some(DecodedPacket {
            kind,
            sequence,
            valid: false,
            body: PacketBody::Opaque,
        });
    }

    let body = match kind {
        PacketKind::Init => {
            if bytes.remaining() < 1 {
                PacketBody::Opaque
            } else {
                let operation_tag = bytes.get_u8();
                let name_bytes = &bytes[..body_bytes_len - 1];
                match (Operation::from_tag(operation_tag), std::str::from_utf8(name_bytes)) {
                    (Some(operation), Ok(filename)) => PacketBody::Init {
                        operation,
                        filename: filename.to_owned(),
                    },
                    _ => PacketBody::Opaque,
                }
            }
        }
        PacketKind::Data => PacketBody::Data {
            payload: Bytes::copy_from_slice(&bytes[..body_bytes_len]),
        },
        PacketKind::Ack => PacketBody::Ack,
        PacketKind::Nack => PacketBody::Nack,
        PacketKind::Fin => PacketBody::Fin,
        PacketKind::Unknown(_) => PacketBody::Opaque,
    };

    Some(DecodedPacket {
        kind,
        sequence,
        valid: true,
        body,
    })
}

/// FNV-1a, 32-bit variant. Simple and fast enough for a per-datagram
/// checksum; this is error detection, not a cryptographic guarantee.
fn fnv1a(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
