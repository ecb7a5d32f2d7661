use pixpipe_frame::FrameError;
use pixpipe_transport::{ErrorKind, TransportError};

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No receiver is connected to the sender.
    #[error("no receiver connected")]
    NotConnected,

    /// The sender has not been bound to a port yet.
    #[error("sender is not listening")]
    NotListening,
}

impl PeerError {
    /// Classify this error for endpoint state handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PeerError::Transport(err) => err.kind(),
            PeerError::Frame(err) => err.kind(),
            PeerError::NotConnected | PeerError::NotListening => ErrorKind::Connection,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
