//! Shared types for the filexfer workspace.
//!
//! This crate contains the wire-independent vocabulary both the transport
//! crate and the two binaries need: the error enum raised at fallible
//! boundaries, and the small set of protocol constants/enums (`Protocol`,
//! `Operation`, retry budget, window sizes) that both client and server must
//! agree on.

pub mod constants;
pub mod error;
pub mod protocol;

pub use constants::*;
pub use error::FileTransferError;
pub use protocol::{Operation, Protocol};
