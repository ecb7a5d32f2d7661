use std::time::Duration;

use pixpipe_transport::{ErrorKind, TransportError};

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The peer started a frame and then stopped sending.
    #[error("peer stalled after {received} of {expected} bytes ({idle:?} without progress)")]
    Stalled {
        received: usize,
        expected: usize,
        idle: Duration,
    },

    /// The declared payload length disagrees with the image geometry.
    #[error(
        "payload length mismatch: got {declared} bytes, {height}x{width} at {bit_depth} bits needs {expected}"
    )]
    LengthMismatch {
        declared: usize,
        expected: usize,
        height: u16,
        width: u16,
        bit_depth: u16,
    },

    /// The bit depth is neither 8 nor 16.
    #[error("unsupported bit depth {0} (expected 8 or 16)")]
    InvalidBitDepth(u16),

    /// Height or width is zero.
    #[error("empty image ({height}x{width})")]
    EmptyImage { height: u16, width: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl FrameError {
    /// Classify this error for endpoint state handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Io(err) => ErrorKind::of_io(err),
            FrameError::ConnectionClosed | FrameError::Stalled { .. } => ErrorKind::Connection,
            FrameError::LengthMismatch { .. }
            | FrameError::InvalidBitDepth(_)
            | FrameError::EmptyImage { .. }
            | FrameError::PayloadTooLarge { .. } => ErrorKind::MalformedFrame,
        }
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Resolve { source, .. } => FrameError::Io(source),
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
