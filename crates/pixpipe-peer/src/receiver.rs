use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use pixpipe_frame::{
    ErrorKind, FrameConfig, FrameError, FrameReader, Image, DEFAULT_MAX_PAYLOAD,
    DEFAULT_STALL_TIMEOUT,
};
use pixpipe_transport::{resolve, PixStream, TcpTransport};
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::error::Result;
use crate::source::ImageSink;

/// Lifecycle of a [`Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    Connected,
}

/// Result of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// A new connection was established.
    Connected,
    /// A connection already existed; nothing was done.
    AlreadyConnected,
    /// The sender host actively refused the connection.
    Refused,
    /// The attempt timed out or the host could not be reached.
    Unreachable,
}

impl ConnectStatus {
    /// True when a connection exists after the attempt.
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectStatus::Connected | ConnectStatus::AlreadyConnected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectStatus::Connected => "connected",
            ConnectStatus::AlreadyConnected => "already connected",
            ConnectStatus::Refused => "refused",
            ConnectStatus::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one receive poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing complete arrived within the poll timeout.
    NoFrameYet,
    /// A fully decoded image.
    Frame(Image),
}

impl PollOutcome {
    pub fn is_frame(&self) -> bool {
        matches!(self, PollOutcome::Frame(_))
    }

    pub fn into_frame(self) -> Option<Image> {
        match self {
            PollOutcome::Frame(image) => Some(image),
            PollOutcome::NoFrameYet => None,
        }
    }
}

/// Receiver endpoint configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Bound on a single connection attempt, across all resolved addresses.
    pub connect_timeout: Duration,
    /// How long one poll waits for the first header byte.
    pub poll_timeout: Duration,
    /// How long a started frame may go without progress.
    pub stall_timeout: Duration,
    /// Largest payload accepted from the sender.
    pub max_payload_size: usize,
    /// Reconnect pacing after failed attempts.
    pub backoff: BackoffConfig,
    /// Upper bound on frames [`Receiver::poll_latest`] decodes per call.
    pub latest_drain_limit: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(200),
            poll_timeout: Duration::from_micros(100),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            backoff: BackoffConfig::default(),
            latest_drain_limit: 64,
        }
    }
}

/// Frame-consuming endpoint.
///
/// The receiver never spawns threads or sleeps on its own. The caller drives
/// it by calling [`Receiver::poll_frame`] from its own loop or timer; each
/// call waits at most `poll_timeout` for a new frame to start. A lost or
/// corrupted connection is dropped and re-established transparently.
///
/// Host names are resolved by the first attempt and again on every explicit
/// [`Receiver::connect`]; reconnects made from [`Receiver::poll_frame`] reuse
/// the cached addresses so a slow resolver cannot stall the polling loop.
pub struct Receiver {
    host: String,
    port: u16,
    addrs: Vec<SocketAddr>,
    config: ReceiverConfig,
    reader: Option<FrameReader<PixStream>>,
    peer_addr: Option<SocketAddr>,
    state: ReceiverState,
    status: Option<ConnectStatus>,
    backoff: Backoff,
    frames_received: u64,
    connections: u64,
}

impl Receiver {
    /// Create a receiver for `host:port` with default configuration.
    ///
    /// No connection is made until [`Receiver::connect`] or
    /// [`Receiver::poll_frame`] is called.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(host, port, ReceiverConfig::default())
    }

    pub fn with_config(host: impl Into<String>, port: u16, config: ReceiverConfig) -> Self {
        let host = host.into();
        let addrs = host
            .parse::<IpAddr>()
            .map(|ip| vec![SocketAddr::new(ip, port)])
            .unwrap_or_default();
        let backoff = Backoff::new(config.backoff);
        Self {
            host,
            port,
            addrs,
            config,
            reader: None,
            peer_addr: None,
            state: ReceiverState::Disconnected,
            status: None,
            backoff,
            frames_received: 0,
            connections: 0,
        }
    }

    /// Make one bounded connection attempt, ignoring the reconnect backoff.
    ///
    /// Refused and unreachable senders are reported through the returned
    /// status; only a host name that does not resolve is an error.
    pub fn connect(&mut self) -> Result<ConnectStatus> {
        if self.reader.is_some() {
            self.status = Some(ConnectStatus::AlreadyConnected);
            return Ok(ConnectStatus::AlreadyConnected);
        }

        let now = Instant::now();
        match self.attempt(true) {
            Ok(status) => {
                if status == ConnectStatus::Connected {
                    self.backoff.reset();
                } else {
                    self.backoff.record_failure(now);
                }
                self.status = Some(status);
                Ok(status)
            }
            Err(err) => {
                self.backoff.record_failure(now);
                self.status = Some(ConnectStatus::Unreachable);
                Err(err)
            }
        }
    }

    /// One connection attempt. Resolves the host when `refresh` is set or
    /// nothing is cached yet.
    fn attempt(&mut self, refresh: bool) -> Result<ConnectStatus> {
        self.state = ReceiverState::Connecting;
        if refresh || self.addrs.is_empty() {
            match resolve(&self.host, self.port) {
                Ok(addrs) => self.addrs = addrs,
                Err(err) => {
                    self.state = ReceiverState::Disconnected;
                    return Err(err.into());
                }
            }
        }

        let stream = match TcpTransport::connect_any(&self.addrs, self.config.connect_timeout) {
            Ok(stream) => stream,
            Err(err) => {
                self.state = ReceiverState::Disconnected;
                let status = if err.is_refused() {
                    ConnectStatus::Refused
                } else {
                    ConnectStatus::Unreachable
                };
                debug!(host = %self.host, port = self.port, error = %err, %status, "connect attempt failed");
                return Ok(status);
            }
        };

        if let Err(err) = self.attach(stream) {
            warn!(host = %self.host, port = self.port, error = %err, "could not configure connection");
            self.state = ReceiverState::Disconnected;
            return Ok(ConnectStatus::Unreachable);
        }
        Ok(ConnectStatus::Connected)
    }

    fn attach(&mut self, stream: PixStream) -> Result<()> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            read_timeout: Some(self.config.poll_timeout.max(Duration::from_micros(1))),
            write_timeout: None,
            stall_timeout: self.config.stall_timeout,
        };
        self.reader = Some(FrameReader::with_config_pix(stream, config)?);
        self.peer_addr = Some(peer);
        self.state = ReceiverState::Connected;
        self.connections += 1;
        info!(peer = %peer, "connected to sender");
        Ok(())
    }

    /// Wait up to `poll_timeout` for the next frame.
    ///
    /// Never fails. Connection loss and malformed frames drop the connection
    /// and trigger a reconnect attempt; while disconnected every call makes
    /// at most one attempt, paced by the backoff.
    pub fn poll_frame(&mut self) -> PollOutcome {
        let Some(reader) = self.reader.as_mut() else {
            self.reconnect_if_due();
            return PollOutcome::NoFrameYet;
        };

        match reader.poll_image() {
            Ok(Some(image)) => {
                self.frames_received += 1;
                PollOutcome::Frame(image)
            }
            Ok(None) => PollOutcome::NoFrameYet,
            Err(err) => {
                self.lose_connection(&err);
                self.reconnect_if_due();
                PollOutcome::NoFrameYet
            }
        }
    }

    /// Decode every frame already available and return only the newest.
    ///
    /// At most `latest_drain_limit` frames are decoded per call.
    pub fn poll_latest(&mut self) -> PollOutcome {
        let PollOutcome::Frame(mut latest) = self.poll_frame() else {
            return PollOutcome::NoFrameYet;
        };

        let mut skipped = 0usize;
        for _ in 1..self.config.latest_drain_limit.max(1) {
            match self.poll_frame() {
                PollOutcome::Frame(newer) => {
                    latest = newer;
                    skipped += 1;
                }
                PollOutcome::NoFrameYet => break,
            }
        }
        if skipped > 0 {
            debug!(skipped, "skipped stale frames");
        }
        PollOutcome::Frame(latest)
    }

    /// Poll once and hand any frame to `sink`. Returns whether a frame arrived.
    pub fn poll_into<S: ImageSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        match self.poll_frame() {
            PollOutcome::Frame(image) => {
                sink.consume(image);
                true
            }
            PollOutcome::NoFrameYet => false,
        }
    }

    fn lose_connection(&mut self, err: &FrameError) {
        match err.kind() {
            ErrorKind::MalformedFrame => {
                warn!(peer = ?self.peer_addr, error = %err, "malformed frame, dropping connection");
            }
            ErrorKind::Timeout | ErrorKind::Connection => {
                info!(peer = ?self.peer_addr, error = %err, "connection to sender lost");
            }
        }
        self.drop_connection();
    }

    fn reconnect_if_due(&mut self) {
        let now = Instant::now();
        if !self.backoff.ready(now) {
            return;
        }

        match self.attempt(false) {
            Ok(ConnectStatus::Connected) => {
                self.backoff.reset();
                self.status = Some(ConnectStatus::Connected);
            }
            Ok(status) => {
                let delay = self.backoff.record_failure(now);
                self.status = Some(status);
                debug!(%status, ?delay, failures = self.backoff.failures(), "reconnect deferred");
            }
            Err(err) => {
                let delay = self.backoff.record_failure(now);
                self.status = Some(ConnectStatus::Unreachable);
                warn!(host = %self.host, error = %err, ?delay, "reconnect failed");
            }
        }
    }

    /// Drop the current connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(peer) = self.peer_addr {
            info!(peer = %peer, "disconnecting from sender");
        }
        self.drop_connection();
    }

    fn drop_connection(&mut self) {
        self.reader = None;
        self.peer_addr = None;
        self.state = ReceiverState::Disconnected;
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Status of the most recent connection attempt.
    pub fn status(&self) -> Option<ConnectStatus> {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Address of the connected sender.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Complete frames decoded so far, across all connections.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Connections established so far, including the first.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("peer_addr", &self.peer_addr)
            .field("frames_received", &self.frames_received)
            .finish()
    }
}
