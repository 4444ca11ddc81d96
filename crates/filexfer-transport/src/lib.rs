//! # filexfer-transport
//!
//! Reliable file-transfer core: packet codec, Stop-and-Wait/Selective-Repeat
//! sender engine, receiver reorder buffer, per-peer session state, and the
//! request dispatcher that drives all of it from a socket-agnostic accept
//! loop.
//!
//! ## Crate structure
//!
//! - [`wire`] — Packet header/body encode/decode, checksum
//! - [`window`] — Fixed-capacity send window shared by both protocols
//! - [`sr_engine`] — Selective-Repeat (and Stop-and-Wait) sender engine
//! - [`reorder`] — Receiver-side out-of-order buffer for uploads
//! - [`session`] — Per-peer session state
//! - [`socket`] — Datagram transport abstraction (`UdpTransport`)
//! - [`store`] — File storage abstraction (`Store`)
//! - [`stats`] — Per-session transfer counters
//! - [`dispatcher`] — Request handler: demultiplex, dispatch, drive sessions

pub mod dispatcher;
pub mod reorder;
pub mod session;
pub mod socket;
pub mod sr_engine;
pub mod stats;
pub mod store;
pub mod window;
pub mod wire;
