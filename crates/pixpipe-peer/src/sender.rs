use std::net::SocketAddr;
use std::num::NonZeroU16;
use std::thread;
use std::time::Duration;

use pixpipe_frame::{ErrorKind, FrameConfig, FrameWriter, Image, DEFAULT_MAX_PAYLOAD};
use pixpipe_transport::{PixStream, TcpTransport};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::pattern::{test_pattern, TEST_PATTERN_SIZE};
use crate::source::ImageSource;

/// Accept polls before [`Sender::accept_latest`] gives up (about two seconds
/// at the default poll interval).
pub const DEFAULT_ACCEPT_POLLS: u32 = 20_000;

/// Lifecycle of a [`Sender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// No listening socket yet.
    Idle,
    /// Bound and listening, no receiver attached.
    Listening,
    /// Inside [`Sender::accept_latest`].
    Accepting,
    /// A receiver is attached and frames can be sent.
    Connected,
}

/// Sender endpoint configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Pause between accept polls.
    pub accept_poll_interval: Duration,
    /// Emit a debug heartbeat every this many unsuccessful polls.
    pub heartbeat_every: u32,
    /// Bound on a single frame write.
    pub write_timeout: Duration,
    /// Largest payload the sender will put on the wire.
    pub max_payload_size: usize,
    /// Edge length of the handshake test pattern.
    pub test_pattern_size: u16,
    /// Push the test pattern to each newly accepted receiver.
    pub send_test_pattern: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            accept_poll_interval: Duration::from_micros(100),
            heartbeat_every: 5_000,
            write_timeout: Duration::from_secs(2),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            test_pattern_size: TEST_PATTERN_SIZE,
            send_test_pattern: true,
        }
    }
}

/// Frame-producing endpoint.
///
/// Owns a non-blocking listener and at most one receiver connection. The most
/// recently initiated receiver always wins: each [`Sender::accept_latest`]
/// drains the backlog and keeps only the newest pending connection.
///
/// All mutation goes through `&mut self`; wrap the sender in a `Mutex` to
/// share it between threads.
pub struct Sender {
    config: SenderConfig,
    listener: Option<TcpTransport>,
    writer: Option<FrameWriter<PixStream>>,
    peer_addr: Option<SocketAddr>,
    state: SenderState,
    frames_sent: u64,
    test_pattern: Option<Image>,
}

impl Sender {
    /// Create an idle sender. Call [`Sender::listen_on`] before accepting.
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            listener: None,
            writer: None,
            peer_addr: None,
            state: SenderState::Idle,
            frames_sent: 0,
            test_pattern: None,
        }
    }

    /// Listen on all interfaces at `port` with default configuration.
    pub fn listen(port: u16) -> Result<Self> {
        let mut sender = Self::new(SenderConfig::default());
        sender.listener = Some(TcpTransport::bind_port(port)?);
        sender.state = SenderState::Listening;
        Ok(sender)
    }

    /// Listen on an explicit address.
    pub fn bind(addr: SocketAddr, config: SenderConfig) -> Result<Self> {
        let mut sender = Self::new(config);
        sender.listen_on(addr)?;
        Ok(sender)
    }

    /// Bind the listening socket, replacing any previous one.
    ///
    /// An attached receiver is kept.
    pub fn listen_on(&mut self, addr: SocketAddr) -> Result<()> {
        self.listener = Some(TcpTransport::bind(addr)?);
        if self.writer.is_none() {
            self.state = SenderState::Listening;
        }
        Ok(())
    }

    /// Wait for a receiver and attach the most recent one.
    ///
    /// Polls the listener up to `max_polls` times, `accept_poll_interval`
    /// apart. A failed accept is logged and uses up its poll. Returns
    /// `Ok(false)` when nobody connected in time or the new receiver was lost
    /// during the test pattern push; an existing receiver is left attached in
    /// the first case.
    pub fn accept_latest(&mut self, max_polls: u32) -> Result<bool> {
        let fallback = if self.writer.is_some() {
            SenderState::Connected
        } else {
            SenderState::Listening
        };
        let Some(listener) = self.listener.as_ref() else {
            return Err(PeerError::NotListening);
        };

        self.state = SenderState::Accepting;
        let connected = fallback == SenderState::Connected;
        if connected {
            debug!(addr = %listener.local_addr(), "checking for newer receiver");
        } else {
            info!(addr = %listener.local_addr(), "waiting for receiver");
        }

        let max_polls = max_polls.max(1);
        let accepted = poll_accept(|| listener.try_accept(), max_polls, &self.config);

        let Some((mut stream, mut addr)) = accepted else {
            if !connected {
                info!(max_polls, "no receiver found");
            }
            self.state = fallback;
            return Ok(false);
        };

        // Only the newest pending peer survives; older ones close on drop.
        loop {
            match listener.try_accept() {
                Ok(Some((newer, newer_addr))) => {
                    debug!(dropped = %addr, kept = %newer_addr, "dropping older pending receiver");
                    stream = newer;
                    addr = newer_addr;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "accept failed while draining backlog");
                    break;
                }
            }
        }

        if self.writer.is_some() {
            info!(previous = ?self.peer_addr, "replacing receiver");
        }
        self.drop_connection();

        match self.attach(stream, addr) {
            Ok(()) => {
                info!(peer = %addr, "receiver connected");
                Ok(true)
            }
            Err(err) => {
                warn!(peer = %addr, error = %err, "lost receiver during handshake");
                self.drop_connection();
                Ok(false)
            }
        }
    }

    fn attach(&mut self, stream: PixStream, addr: SocketAddr) -> Result<()> {
        stream.set_nodelay(true)?;
        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            write_timeout: Some(self.config.write_timeout),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_pix(stream, frame_config)?;

        let size = NonZeroU16::new(self.config.test_pattern_size)
            .filter(|_| self.config.send_test_pattern);
        if let Some(size) = size {
            let pattern = self.test_pattern.get_or_insert_with(|| test_pattern(size));
            writer.write_image(pattern)?;
            debug!(peer = %addr, size = size.get(), "sent test pattern");
        }

        self.writer = Some(writer);
        self.peer_addr = Some(addr);
        self.state = SenderState::Connected;
        Ok(())
    }

    /// Send one image to the attached receiver.
    ///
    /// Without a receiver this fails with [`PeerError::NotConnected`]. A
    /// timeout or broken connection drops the receiver and returns the sender
    /// to `Listening`; an image the wire format cannot carry is rejected
    /// before any byte is written and leaves the connection alone.
    pub fn send_frame(&mut self, image: &Image) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PeerError::NotConnected);
        };

        match writer.write_image(image) {
            Ok(()) => {
                self.frames_sent += 1;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::MalformedFrame => {
                warn!(error = %err, "refusing to send frame");
                Err(err.into())
            }
            Err(err) => {
                warn!(peer = ?self.peer_addr, error = %err, "send failed, dropping receiver");
                self.drop_connection();
                Err(err.into())
            }
        }
    }

    /// Pull the next image from `source` and send it.
    pub fn send_from<S: ImageSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        if self.writer.is_none() {
            return Err(PeerError::NotConnected);
        }
        let image = source.next_frame();
        self.send_frame(&image)
    }

    /// Close the receiver connection, if any, and keep listening.
    pub fn disconnect(&mut self) {
        if let Some(addr) = self.peer_addr {
            info!(peer = %addr, "disconnecting receiver");
        }
        self.drop_connection();
    }

    fn drop_connection(&mut self) {
        self.writer = None;
        self.peer_addr = None;
        self.state = if self.listener.is_some() {
            SenderState::Listening
        } else {
            SenderState::Idle
        };
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Address of the attached receiver.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Bound listening address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(TcpTransport::local_addr)
    }

    /// Frames delivered through [`Sender::send_frame`], test patterns excluded.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }
}

/// Call `try_accept` up to `max_polls` times until it yields a connection.
fn poll_accept<T, E: std::fmt::Display>(
    mut try_accept: impl FnMut() -> std::result::Result<Option<T>, E>,
    max_polls: u32,
    config: &SenderConfig,
) -> Option<T> {
    let heartbeat_every = config.heartbeat_every.max(1);
    for poll in 1..=max_polls {
        match try_accept() {
            Ok(Some(conn)) => return Some(conn),
            Ok(None) => {}
            Err(err) => warn!(poll, error = %err, "accept failed"),
        }
        if poll % heartbeat_every == 0 {
            debug!(poll, max_polls, "still waiting for receiver");
        }
        if poll < max_polls {
            thread::sleep(config.accept_poll_interval);
        }
    }
    None
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("state", &self.state)
            .field("local_addr", &self.local_addr())
            .field("peer_addr", &self.peer_addr)
            .field("frames_sent", &self.frames_sent)
            .finish()
    }
}
