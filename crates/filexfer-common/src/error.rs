//! The error taxonomy for the file-transfer service.
//!
//! None of these variants correspond to a wire-level "error packet" — there
//! isn't one. Checksum failures become a `Nack`, an unknown packet kind is
//! logged and dropped, a missing download file becomes a `Fin` — none of
//! that is routed through `Result`. This enum covers what genuinely is:
//! the `Store`/`UdpTransport` I/O boundaries, and the sender engine's retry
//! budget, the two places real plumbing can fail and needs to propagate
//! that with `?` instead of an `io::Result` the caller has to interpret.
#[derive(Debug, thiserror::Error)]
pub enum FileTransferError {
    #[error("retry budget exhausted for sequence {sequence}")]
    RetryBudgetExhausted { sequence: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FileTransferError {
    /// `true` for a transport-level timeout or would-block — the condition
    /// every accept/retry loop treats as "nothing arrived yet, try again"
    /// rather than a real failure.
    pub fn is_retriable_timeout(&self) -> bool {
        matches!(
            self,
            FileTransferError::Io(e)
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}
