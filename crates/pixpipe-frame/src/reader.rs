use std::io::Read;

use pixpipe_transport::PixStream;
use tracing::trace;

use crate::channel::{read_exact, try_read_exact, ReadOutcome};
use crate::codec::{FrameConfig, FrameHeader, HEADER_SIZE};
use crate::error::{transport_to_frame_error, Result};
use crate::image::Image;

/// Reads complete images from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete images.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    frames_read: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            frames_read: 0,
        }
    }

    /// Read the next image if one has started arriving.
    ///
    /// Returns `Ok(None)` when the stream's read timeout expires before any
    /// header byte arrives. Once a header byte is seen the whole frame is
    /// read, waiting at most `stall_timeout` between bytes.
    pub fn poll_image(&mut self) -> Result<Option<Image>> {
        match try_read_exact(&mut self.inner, HEADER_SIZE, self.config.stall_timeout)? {
            ReadOutcome::NoData => Ok(None),
            ReadOutcome::Complete(header) => self.finish(&header).map(Some),
        }
    }

    /// Read the next image.
    ///
    /// With a read timeout configured this fails with `Stalled` when no byte
    /// arrives within `stall_timeout`; without one it blocks.
    pub fn read_image(&mut self) -> Result<Image> {
        let header = read_exact(&mut self.inner, HEADER_SIZE, self.config.stall_timeout)?;
        self.finish(&header)
    }

    fn finish(&mut self, raw: &[u8]) -> Result<Image> {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(raw);
        let header = FrameHeader::parse(&bytes);
        let bit_depth = header.validate(self.config.max_payload_size)?;

        let payload = read_exact(
            &mut self.inner,
            header.payload_len as usize,
            self.config.stall_timeout,
        )?;
        let image = Image::new(header.height, header.width, bit_depth, payload.freeze())?;

        self.frames_read += 1;
        trace!(
            height = header.height,
            width = header.width,
            bit_depth = header.bit_depth,
            bytes = header.payload_len,
            "read frame"
        );
        Ok(image)
    }

    /// Number of images read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<PixStream> {
    /// Create a frame reader for `PixStream` and apply read timeout from config.
    pub fn with_config_pix(inner: PixStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    use bytes::{BufMut, BytesMut};
    use pixpipe_transport::TcpTransport;

    use super::*;
    use crate::codec::encode_image;
    use crate::error::FrameError;
    use crate::image::BitDepth;
    use crate::writer::FrameWriter;

    fn wire(images: &[&Image]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for image in images {
            encode_image(image, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    /// Connected loopback pair: (client, server).
    fn tcp_pair() -> (PixStream, PixStream) {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpTransport::bind(addr).unwrap();
        let client = TcpTransport::connect(listener.local_addr(), Duration::from_secs(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some((server, _)) = listener.try_accept().unwrap() {
                return (client, server);
            }
            assert!(Instant::now() < deadline, "accept timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn read_single_image() {
        let image = Image::filled(3, 5, BitDepth::Sixteen, 4242).unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire(&[&image])));

        let decoded = reader.read_image().unwrap();
        assert_eq!(decoded, image);
        assert_eq!(reader.frames_read(), 1);
    }

    #[test]
    fn read_multiple_images_in_order() {
        let a = Image::filled(1, 1, BitDepth::Eight, 1).unwrap();
        let b = Image::filled(2, 2, BitDepth::Sixteen, 2).unwrap();
        let c = Image::filled(3, 1, BitDepth::Eight, 3).unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire(&[&a, &b, &c])));

        assert_eq!(reader.poll_image().unwrap().unwrap(), a);
        assert_eq!(reader.poll_image().unwrap().unwrap(), b);
        assert_eq!(reader.poll_image().unwrap().unwrap(), c);
    }

    #[test]
    fn partial_read_handling() {
        let image = Image::from_u16(2, 2, &[1, 2, 3, 4]).unwrap();
        let byte_reader = ByteByByteReader {
            bytes: wire(&[&image]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_image().unwrap(), image);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.poll_image().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32(16);
        partial.put_u16(4);
        partial.put_u16(4);
        partial.put_u16(8);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.poll_image().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn malformed_header_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(10);
        bytes.put_u16(4);
        bytes.put_u16(4);
        bytes.put_u16(16);
        bytes.put_bytes(0xAA, 10);

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        let err = reader.poll_image().unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
        assert_eq!(reader.frames_read(), 0);
    }

    #[test]
    fn oversized_frame_in_stream() {
        let image = Image::filled(16, 16, BitDepth::Sixteen, 0).unwrap();
        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire(&[&image])), cfg);
        let err = reader.read_image().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn poll_returns_none_on_timeout_then_frame() {
        let image = Image::filled(2, 2, BitDepth::Eight, 7).unwrap();
        let reader = TimeoutThenData {
            timeouts_left: 2,
            bytes: wire(&[&image]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);

        assert!(framed.poll_image().unwrap().is_none());
        assert!(framed.poll_image().unwrap().is_none());
        assert_eq!(framed.poll_image().unwrap().unwrap(), image);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct TimeoutThenData {
        timeouts_left: usize,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for TimeoutThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.timeouts_left > 0 {
                self.timeouts_left -= 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.set_max_payload_size(64);
        assert_eq!(reader.config().max_payload_size, 64);
        let _inner = reader.into_inner();
    }

    #[test]
    fn poll_over_tcp_times_out_without_data() {
        let (_client, server) = tcp_pair();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_micros(200)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_pix(server, cfg).unwrap();

        let started = Instant::now();
        assert!(reader.poll_image().unwrap().is_none());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn roundtrip_over_tcp() {
        let (client, server) = tcp_pair();
        let image = Image::filled(480, 640, BitDepth::Sixteen, 513).unwrap();
        let expected = image.clone();

        let sender = std::thread::spawn(move || {
            let mut writer = FrameWriter::new(client);
            writer.write_image(&image).unwrap();
        });

        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(1)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_pix(server, cfg).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let decoded = loop {
            if let Some(image) = reader.poll_image().unwrap() {
                break image;
            }
            assert!(Instant::now() < deadline, "no frame received");
        };

        assert_eq!(decoded, expected);
        sender.join().unwrap();
    }

    #[test]
    fn peer_shutdown_is_connection_closed() {
        let (client, server) = tcp_pair();
        client.shutdown().unwrap();

        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_pix(server, cfg).unwrap();
        let err = reader.poll_image().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
