//! Error types for respondd requests

use std::io;
use std::net::SocketAddrV6;
use thiserror::Error;

/// Error type a response handler may return to abort a request.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of a single respondd request.
///
/// A request that simply receives no answers is not an error; these variants
/// cover the cases where something is actually broken.
#[derive(Debug, Error)]
pub enum RespondError {
    /// The UDP socket could not be created
    #[error("failed to open respondd socket: {0}")]
    Socket(#[source] io::Error),

    /// The query datagram could not be sent
    #[error("failed to send query to {dst}: {source}")]
    Send {
        dst: SocketAddrV6,
        #[source]
        source: io::Error,
    },

    /// Receiving failed for a reason other than the timeout
    #[error("failed to receive response: {0}")]
    Receive(#[source] io::Error),

    /// The response handler asked to abort the request
    #[error("response handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl RespondError {
    /// Underlying OS error code, if the failure came from a system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Socket(e) | Self::Send { source: e, .. } | Self::Receive(e) => e.raw_os_error(),
            Self::Handler(_) => None,
        }
    }
}

/// Result type alias for respondd operations
pub type Result<T> = std::result::Result<T, RespondError>;
