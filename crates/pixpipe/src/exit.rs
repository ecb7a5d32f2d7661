use std::fmt;

use pixpipe_frame::{ErrorKind, FrameError};
use pixpipe_peer::PeerError;
use pixpipe_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn kind_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::Connection => TRANSPORT_ERROR,
        ErrorKind::MalformedFrame => DATA_INVALID,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(kind_code(err.kind()), format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(kind_code(err.kind()), format!("{context}: {err}"))
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::NotConnected | PeerError::NotListening => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}
