use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::image::{BitDepth, Image};

/// Frame header: length (4) + height (2) + width (2) + bit depth (2) = 10 bytes.
pub const HEADER_SIZE: usize = 10;

/// Wire protocol revision implemented by this crate.
///
/// Revision 1 had an 8-byte header without the bit-depth field and always
/// carried 16-bit samples. It is not wire-compatible with revision 2 and is
/// not supported.
pub const PROTOCOL_VERSION: u16 = 2;

/// Default maximum payload size: 256 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// Default time a started frame may go without progress.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Decoded frame header.
///
/// Wire format (all header fields big-endian):
/// ```text
/// ┌─────────────┬──────────┬──────────┬───────────┬──────────────────────┐
/// │ Length (4B) │ Height   │ Width    │ Bit depth │ Payload              │
/// │ u32 BE      │ u16 BE   │ u16 BE   │ u16 BE    │ (Length bytes,       │
/// │             │          │          │ 8 or 16   │  row-major, LE u16)  │
/// └─────────────┴──────────┴──────────┴───────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u32,
    pub height: u16,
    pub width: u16,
    pub bit_depth: u16,
}

impl FrameHeader {
    /// Header describing `image`.
    pub fn for_image(image: &Image) -> Result<Self> {
        let size = image.data().len();
        let payload_len = u32::try_from(size).map_err(|_| FrameError::PayloadTooLarge {
            size,
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            payload_len,
            height: image.height(),
            width: image.width(),
            bit_depth: image.bit_depth().bits(),
        })
    }

    /// Parse the fixed-size header. Performs no validation.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut src = &bytes[..];
        Self {
            payload_len: src.get_u32(),
            height: src.get_u16(),
            width: src.get_u16(),
            bit_depth: src.get_u16(),
        }
    }

    /// Append the encoded header to `dst`.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32(self.payload_len);
        dst.put_u16(self.height);
        dst.put_u16(self.width);
        dst.put_u16(self.bit_depth);
    }

    /// Check the header against the image invariants.
    ///
    /// Runs before any payload byte is read so a corrupt length never makes
    /// the reader allocate or wait for a bogus payload.
    pub fn validate(&self, max_payload: usize) -> Result<BitDepth> {
        let bit_depth = BitDepth::from_bits(self.bit_depth)?;
        if self.height == 0 || self.width == 0 {
            return Err(FrameError::EmptyImage {
                height: self.height,
                width: self.width,
            });
        }
        let declared = self.payload_len as usize;
        if declared > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: declared,
                max: max_payload,
            });
        }
        let expected = Image::expected_len(self.height, self.width, bit_depth);
        if declared != expected {
            return Err(FrameError::LengthMismatch {
                declared,
                expected,
                height: self.height,
                width: self.width,
                bit_depth: self.bit_depth,
            });
        }
        Ok(bit_depth)
    }

    /// Total wire size of the frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }
}

/// Encode an image into the wire format.
pub fn encode_image(image: &Image, dst: &mut BytesMut) -> Result<()> {
    let header = FrameHeader::for_image(image)?;
    dst.reserve(header.wire_size());
    header.write(dst);
    dst.put_slice(image.data());
    Ok(())
}

/// Decode an image from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// The header is validated as soon as it is complete. On success, consumes
/// the frame bytes from the buffer.
pub fn decode_image(src: &mut BytesMut, max_payload: usize) -> Result<Option<Image>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&src[..HEADER_SIZE]);
    let header = FrameHeader::parse(&raw);
    let bit_depth = header.validate(max_payload)?;

    if src.len() < header.wire_size() {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(header.payload_len as usize).freeze();
    Image::new(header.height, header.width, bit_depth, payload).map(Some)
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 256 MiB.
    pub max_payload_size: usize,
    /// Read timeout applied to the stream. `None` blocks.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the stream. `None` blocks.
    pub write_timeout: Option<Duration>,
    /// How long a started frame may go without receiving a byte.
    pub stall_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}
