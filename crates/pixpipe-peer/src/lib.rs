//! Sender and receiver endpoints for streaming images over TCP.
//!
//! This is the "just works" layer. A [`Sender`] listens, attaches the most
//! recent receiver and pushes frames to it; a [`Receiver`] connects, polls
//! for frames and reconnects on its own when the sender goes away. Both are
//! plain state machines driven by the caller: no threads, no globals, and
//! every wait is bounded.

pub mod backoff;
pub mod error;
pub mod pattern;
pub mod receiver;
pub mod sender;
pub mod source;

pub use backoff::{Backoff, BackoffConfig};
pub use error::{PeerError, Result};
pub use pattern::{gaussian, test_pattern, GaussianSource, TEST_PATTERN_FWHM, TEST_PATTERN_SIZE};
pub use receiver::{ConnectStatus, PollOutcome, Receiver, ReceiverConfig, ReceiverState};
pub use sender::{Sender, SenderConfig, SenderState, DEFAULT_ACCEPT_POLLS};
pub use source::{ImageSink, ImageSource};

/// Port the sender listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 60000;
