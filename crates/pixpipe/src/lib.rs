//! Stream grayscale camera frames between processes over TCP.
//!
//! One process owns the camera and runs a sender; another connects as a
//! receiver and polls for frames. Images travel as a 10-byte header plus raw
//! row-major samples, and the most recently connected receiver always wins.
//!
//! # Crate Structure
//!
//! - [`transport`]: Non-blocking TCP listener and timeout-bounded streams
//! - [`frame`]: Image type, wire codec and exact-length framed I/O
//! - [`peer`]: Sender and receiver endpoints (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use pixpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pixpipe_frame::*;
}

/// Re-export endpoint types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use pixpipe_peer::*;
}
