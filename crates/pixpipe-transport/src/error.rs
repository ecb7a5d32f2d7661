use std::io;
use std::net::SocketAddr;

/// Coarse classification shared by every pixpipe error type.
///
/// Endpoints pattern-match on this instead of on concrete error variants:
/// a `Timeout` means "nothing happened yet", a `Connection` error means the
/// current stream is gone, and a `MalformedFrame` means the peer violated the
/// wire format and the stream can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A bounded wait elapsed without progress.
    Timeout,
    /// The peer closed or reset the connection, or it could not be established.
    Connection,
    /// Frame header and payload are inconsistent.
    MalformedFrame,
}

impl ErrorKind {
    /// Classify a raw I/O error.
    pub fn of_io(err: &io::Error) -> Self {
        if is_timeout(err) {
            ErrorKind::Timeout
        } else {
            ErrorKind::Connection
        }
    }
}

/// Returns true for the error kinds platforms use to report socket timeouts.
///
/// Unix reports an expired `SO_RCVTIMEO`/`SO_SNDTIMEO` as `WouldBlock`,
/// Windows as `TimedOut`.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Errors that can occur in TCP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    /// Host name did not resolve to any usable address.
    #[error("failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify this error for endpoint state handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connect { source, .. }
            | TransportError::Accept(source)
            | TransportError::Io(source) => ErrorKind::of_io(source),
            TransportError::Bind { .. } | TransportError::Resolve { .. } => ErrorKind::Connection,
        }
    }

    /// True when the remote host actively refused the connection.
    pub fn is_refused(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { source, .. }
                if source.kind() == io::ErrorKind::ConnectionRefused
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_kinds_are_classified_as_timeout() {
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(ErrorKind::of_io(&would_block), ErrorKind::Timeout);
        assert_eq!(ErrorKind::of_io(&timed_out), ErrorKind::Timeout);
    }

    #[test]
    fn broken_pipe_is_connection_kind() {
        let err = TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn refused_connect_is_detected() {
        let err = TransportError::Connect {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.is_refused());
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
