//! Bounded-timeout TCP transport for image streaming.
//!
//! This is the lowest layer of pixpipe. It provides:
//! - [`TcpTransport`], a non-blocking listener whose accept never parks the caller
//! - [`PixStream`], a connected stream with explicit read/write timeouts
//! - [`ErrorKind`], the timeout/connection/malformed classification every
//!   higher layer reports its errors through

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{is_timeout, ErrorKind, Result, TransportError};
pub use stream::PixStream;
pub use tcp::{resolve, TcpTransport};
