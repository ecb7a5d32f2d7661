//! Exact-length framing and grayscale image codec.
//!
//! Every image is framed with a fixed 10-byte big-endian header:
//! - a 4-byte payload length
//! - 2-byte height and width
//! - a 2-byte bit depth (8 or 16)
//!
//! followed by the raw row-major samples. Readers never hand out partial
//! images and reject inconsistent headers before touching the payload.

pub mod channel;
pub mod codec;
pub mod error;
pub mod image;
pub mod reader;
pub mod writer;

pub use channel::{read_exact, try_read_exact, write_exact, ReadOutcome};
pub use codec::{
    decode_image, encode_image, FrameConfig, FrameHeader, DEFAULT_MAX_PAYLOAD,
    DEFAULT_STALL_TIMEOUT, HEADER_SIZE, PROTOCOL_VERSION,
};
pub use error::{FrameError, Result};
pub use image::{BitDepth, Image};
pub use pixpipe_transport::ErrorKind;
pub use reader::FrameReader;
pub use writer::FrameWriter;
