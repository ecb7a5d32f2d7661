//! Exact-length byte I/O over a stream socket.
//!
//! These primitives sit directly on top of `Read`/`Write` and know nothing
//! about images. They are written for blocking sockets that carry a read or
//! write timeout: an expired timeout surfaces from the OS as `WouldBlock` or
//! `TimedOut`, which is how "no data yet" is told apart from a dead peer.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use pixpipe_transport::is_timeout;

use crate::error::{FrameError, Result};

/// Result of a read that is allowed to find nothing.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Exactly the requested number of bytes.
    Complete(BytesMut),
    /// The read timeout elapsed before the first byte arrived.
    NoData,
}

/// Write all of `bytes`, then flush.
///
/// A zero-length write or any error other than `Interrupted` fails. Timeouts
/// are not retried: a write timeout means the peer stopped draining and the
/// frame can no longer be delivered intact.
pub fn write_exact<W: Write>(stream: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match stream.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }

    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Read exactly `n` bytes.
///
/// Read timeouts are absorbed until `stall_timeout` passes without any byte
/// arriving, at which point the read fails with [`FrameError::Stalled`].
/// A zero-length read always means the peer closed the stream.
pub fn read_exact<R: Read>(stream: &mut R, n: usize, stall_timeout: Duration) -> Result<BytesMut> {
    let mut buf = BytesMut::zeroed(n);
    fill(stream, &mut buf, 0, stall_timeout)?;
    Ok(buf)
}

/// Read exactly `n` bytes, or nothing.
///
/// If the first underlying read times out, returns [`ReadOutcome::NoData`].
/// As soon as one byte has arrived the call is committed and behaves like
/// [`read_exact`] for the remainder.
pub fn try_read_exact<R: Read>(
    stream: &mut R,
    n: usize,
    stall_timeout: Duration,
) -> Result<ReadOutcome> {
    let mut buf = BytesMut::zeroed(n);
    if n == 0 {
        return Ok(ReadOutcome::Complete(buf));
    }

    let first = loop {
        match stream.read(&mut buf) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(read) => break read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => return Ok(ReadOutcome::NoData),
            Err(err) => return Err(FrameError::Io(err)),
        }
    };

    fill(stream, &mut buf, first, stall_timeout)?;
    Ok(ReadOutcome::Complete(buf))
}

fn fill<R: Read>(
    stream: &mut R,
    buf: &mut [u8],
    mut filled: usize,
    stall_timeout: Duration,
) -> Result<()> {
    let mut last_progress = Instant::now();
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(read) => {
                filled += read;
                last_progress = Instant::now();
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => {
                let idle = last_progress.elapsed();
                if idle >= stall_timeout {
                    return Err(FrameError::Stalled {
                        received: filled,
                        expected: buf.len(),
                        idle,
                    });
                }
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
