use std::io::Write;

use bytes::BytesMut;
use pixpipe_transport::PixStream;
use tracing::trace;

use crate::channel::write_exact;
use crate::codec::{FrameConfig, FrameHeader, HEADER_SIZE};
use crate::error::{transport_to_frame_error, FrameError, Result};
use crate::image::Image;

/// Writes complete images to any `Write` stream.
///
/// The header is encoded into a small reusable buffer and the pixel payload
/// is written straight from the image, so large frames are never copied.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE),
            config,
            frames_written: 0,
        }
    }

    /// Encode and write one image.
    ///
    /// On error the stream may hold a partial frame and must be discarded.
    pub fn write_image(&mut self, image: &Image) -> Result<()> {
        let size = image.data().len();
        if size > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_payload_size,
            });
        }

        let header = FrameHeader::for_image(image)?;
        self.buf.clear();
        header.write(&mut self.buf);

        write_exact(&mut self.inner, &self.buf)?;
        write_exact(&mut self.inner, image.data())?;

        self.frames_written += 1;
        trace!(
            height = header.height,
            width = header.width,
            bit_depth = header.bit_depth,
            bytes = header.payload_len,
            "wrote frame"
        );
        Ok(())
    }

    /// Number of images written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<PixStream> {
    /// Create a frame writer for `PixStream` and apply write timeout from config.
    pub fn with_config_pix(inner: PixStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_image;
    use crate::image::BitDepth;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_image() {
        let image = Image::filled(4, 4, BitDepth::Sixteen, 1000).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.write_image(&image).unwrap();
        assert_eq!(writer.frames_written(), 1);

        let mut wire = written(writer);
        assert_eq!(wire.len(), HEADER_SIZE + 32);
        let decoded = decode_image(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn write_multiple_images() {
        let a = Image::filled(1, 2, BitDepth::Eight, 1).unwrap();
        let b = Image::filled(2, 1, BitDepth::Sixteen, 2).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.write_image(&a).unwrap();
        writer.write_image(&b).unwrap();

        let mut wire = written(writer);
        assert_eq!(decode_image(&mut wire, usize::MAX).unwrap().unwrap(), a);
        assert_eq!(decode_image(&mut wire, usize::MAX).unwrap().unwrap(), b);
        assert!(wire.is_empty());
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let image = Image::filled(3, 3, BitDepth::Eight, 0).unwrap();
        let err = writer.write_image(&image).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer
            .write_image(&Image::filled(1, 1, BitDepth::Eight, 0).unwrap())
            .unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer
            .write_image(&Image::filled(2, 2, BitDepth::Eight, 5).unwrap())
            .unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), HEADER_SIZE + 4);
    }

    #[test]
    fn write_timeout_fails_frame() {
        let mut writer = FrameWriter::new(TimeoutWriter);
        let err = writer
            .write_image(&Image::filled(1, 1, BitDepth::Eight, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(writer.frames_written(), 0);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer
            .write_image(&Image::filled(1, 1, BitDepth::Eight, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct TimeoutWriter;

    impl Write for TimeoutWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn written_bytes_decode_through_reader() {
        let image = Image::from_u16(2, 3, &[0, 1, 2, 65535, 256, 1000]).unwrap();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_image(&image).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut framed = crate::reader::FrameReader::new(Cursor::new(wire));
        assert_eq!(framed.read_image().unwrap(), image);
    }
}
