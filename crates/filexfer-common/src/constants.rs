//! Wire and session constants shared by both ends of a transfer.

/// Maximum size, in bytes, of a single UDP datagram this service will send
/// or accept. Chosen well under the common path MTU so we never rely on
/// IP fragmentation.
pub const BUFSIZE: usize = 1024;

/// Largest `Data` payload that fits in one `BUFSIZE` datagram once the
/// packet header and checksum trailer are accounted for.
pub const MAX_PAYLOAD: usize = BUFSIZE - 50;

/// Number of unacknowledged retransmissions attempted for a given sequence
/// number before the session is torn down.
pub const MAX_RETRIES: u8 = 10;

/// Stop-and-Wait window size (fixed at 1 by definition of the protocol).
pub const WINDOW_STOP_WAIT: usize = 1;

/// Selective-Repeat window size.
pub const WINDOW_SELECTIVE_REPEAT: usize = 5;

/// Default server listening port.
pub const DEFAULT_PORT: u16 = 9090;

/// Default host clients connect to.
pub const LOCALHOST: &str = "127.0.0.1";

/// Default server-side storage directory for uploaded/served files.
pub const SERVER_STORAGE: &str = "server_storage";

/// Default client-side storage directory for downloaded files.
pub const CLIENT_STORAGE: &str = "client_storage";

/// Socket read timeout, in milliseconds. On the client this doubles as the
/// round-trip budget before a sender considers its last datagram lost and
/// retransmits; on the server it just bounds how long the accept loop blocks
/// before re-checking the shutdown flag.
pub const RETRANSMIT_TIMEOUT_MS: u64 = 500;
