use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::PixStream;

/// Non-blocking TCP listener.
///
/// `accept` never parks the caller: [`TcpTransport::try_accept`] returns
/// `Ok(None)` when the backlog is empty so the caller can interleave its own
/// polling delay, progress output and attempt budget.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on all IPv4 interfaces at `port`.
    pub fn bind_port(port: u16) -> Result<Self> {
        Self::bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }

    /// Bind and listen on an explicit address.
    ///
    /// Port `0` asks the OS for an ephemeral port; read it back with
    /// [`TcpTransport::local_addr`].
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| TransportError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { addr, source: e })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept one pending connection if there is one.
    ///
    /// Returns `Ok(None)` when no connection is pending. A queued connection
    /// that failed before it was accepted is skipped the same way; only
    /// listener-level failures such as descriptor exhaustion are errors.
    pub fn try_accept(&self) -> Result<Option<(PixStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "accepted connection");
                Ok(Some((PixStream::from_tcp(stream)?, addr)))
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(err) if is_dead_pending_connection(&err) => {
                debug!(error = %err, "pending connection failed before accept");
                Ok(None)
            }
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a listening socket, waiting at most `timeout`.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<PixStream> {
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| TransportError::Connect { addr, source: e })?;
        debug!(%addr, "connected to tcp socket");
        PixStream::from_tcp(stream)
    }

    /// Resolve `host:port` and connect to the first address that accepts.
    ///
    /// Resolution itself is not bounded by `timeout`; callers on a tick loop
    /// should resolve once with [`resolve`] and use [`TcpTransport::connect_any`].
    pub fn connect_host(host: &str, port: u16, timeout: Duration) -> Result<PixStream> {
        let addrs = resolve(host, port)?;
        Self::connect_any(&addrs, timeout)
    }

    /// Connect to the first of `addrs` that accepts, within `timeout` in total.
    ///
    /// The remaining budget is split evenly over the candidates not yet
    /// tried. The error from the last candidate is returned when none succeed.
    pub fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> Result<PixStream> {
        let deadline = Instant::now() + timeout;
        let mut last_err = None;
        for (tried, addr) in addrs.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(share) = candidate_timeout(remaining, addrs.len() - tried) else {
                break;
            };
            match Self::connect(*addr, share) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| match addrs.first() {
            Some(addr) => TransportError::Connect {
                addr: *addr,
                source: io::Error::new(io::ErrorKind::TimedOut, "connect budget exhausted"),
            },
            None => TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no addresses to connect to",
            )),
        }))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Errors `accept` reports for a queued connection that died before it was
/// taken off the backlog. The listener itself is still healthy.
fn is_dead_pending_connection(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::TimedOut
    ) || is_protocol_error(err)
}

#[cfg(target_os = "linux")]
fn is_protocol_error(err: &io::Error) -> bool {
    // EPROTO
    err.raw_os_error() == Some(71)
}

#[cfg(not(target_os = "linux"))]
fn is_protocol_error(_err: &io::Error) -> bool {
    false
}

/// Share of `remaining` for the next of `candidates` addresses, or `None`
/// once the budget is spent.
fn candidate_timeout(remaining: Duration, candidates: usize) -> Option<Duration> {
    if remaining.is_zero() {
        return None;
    }
    let share = remaining / u32::try_from(candidates.max(1)).unwrap_or(u32::MAX);
    Some(share.max(Duration::from_millis(1)).min(remaining))
}

/// Resolve a host name and port to socket addresses.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            host: host.to_string(),
            source: e,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}
