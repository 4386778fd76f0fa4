use std::{
  fmt, io,
  net::{Ipv4Addr, SocketAddrV4},
  os::fd::{FromRawFd, RawFd},
  time::Duration,
};

use tracing::{debug, error, trace, warn};

use crate::{buf::Buffer, net_utils::parse_ipv4, socket::Socket};

/// Pending-connection queue length passed to `listen(2)`.
pub const BACKLOG: libc::c_int = 1024;

/// Upper bound of a single `read(2)` issued by [`Connection::read`].
pub const READ_CHUNK: usize = 8 * 1024;

/// How a [`Connection`] came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  /// Returned by [`Connection::connect`].
  Client,
  /// Returned by [`Connection::listen`].
  Listener,
  /// Returned by [`Connection::accept`].
  Accepted,
  /// Built with [`FromRawFd`].
  Adopted,
}

/// Outcome of a successful [`Connection::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Received {
  /// This many bytes were appended to the buffer during the call. Zero when
  /// a non-blocking socket had nothing to offer.
  Bytes(usize),
  /// The peer shut down its sending side.
  Closed,
}

impl Received {
  /// Bytes reported by the call; `0` for [`Received::Closed`].
  pub fn count(self) -> usize {
    match self {
      Received::Bytes(n) => n,
      Received::Closed => 0,
    }
  }

  /// Whether the peer closed its side during the call.
  pub fn is_closed(self) -> bool {
    self == Received::Closed
  }
}

/// An IPv4 TCP socket together with the bytes read from it so far.
///
/// A `Connection` exclusively owns its descriptor and closes it exactly once,
/// either through [`close`](Self::close) or when dropped. Operations that
/// change state take `&mut self`; share a connection between threads only
/// behind external synchronisation.
///
/// # Examples
///
/// ```rust,no_run
/// use tcplink::{Connection, Received};
///
/// fn serve() -> std::io::Result<()> {
///     let listener = Connection::listen("127.0.0.1", 18888)?;
///
///     loop {
///         let mut conn = listener.accept()?;
///         println!("peer: {:?}", conn.peer_addr());
///
///         while let Received::Bytes(n) = conn.read()? {
///             println!("{n} new bytes, {} buffered", conn.buffer().len());
///         }
///     }
/// }
/// ```
pub struct Connection {
  socket: Socket,
  nonblocking: bool,
  role: Role,
  peer: Option<SocketAddrV4>,
  inbound: Buffer,
}

impl Connection {
  fn new(socket: Socket, role: Role, peer: Option<SocketAddrV4>) -> Self {
    Self { socket, nonblocking: false, role, peer, inbound: Buffer::new() }
  }

  /// Opens a connection to `ip:port`.
  ///
  /// `ip` must be a dotted-decimal IPv4 literal. The connect is attempted
  /// exactly once: it is not restarted on `EINTR`, and any failure leaves no
  /// descriptor behind. Keepalive is switched on for the new connection.
  ///
  /// ```rust,no_run
  /// use tcplink::Connection;
  ///
  /// fn example() -> std::io::Result<()> {
  ///     let conn = Connection::connect("10.0.0.7", 6379)?;
  ///     conn.set_nodelay(true);
  ///     Ok(())
  /// }
  /// ```
  pub fn connect(ip: &str, port: u16) -> io::Result<Connection> {
    let addr = parse_ipv4(ip, port)?;
    let socket = Socket::stream()?;
    socket.connect(addr).inspect_err(|err| {
      debug!(%addr, error = %err, "connect failed");
    })?;

    let conn = Connection::new(socket, Role::Client, Some(addr));
    conn.set_keepalive(true);
    debug!(fd = ?conn.fd(), %addr, "connected");
    Ok(conn)
  }

  /// Binds a listening socket on `ip:port` with `SO_REUSEADDR` and a backlog
  /// of [`BACKLOG`].
  ///
  /// The returned connection reports the requested address through
  /// [`peer_addr`](Self::peer_addr).
  pub fn listen(ip: &str, port: u16) -> io::Result<Connection> {
    let addr = parse_ipv4(ip, port)?;
    let socket = Socket::stream()?;
    socket
      .set_reuse_address(true)
      .and_then(|()| socket.bind(addr))
      .and_then(|()| socket.listen(BACKLOG))
      .inspect_err(|err| debug!(%addr, error = %err, "listen failed"))?;

    let conn = Connection::new(socket, Role::Listener, Some(addr));
    debug!(fd = ?conn.fd(), %addr, "listening");
    Ok(conn)
  }

  /// Waits for the next peer on a listening connection.
  ///
  /// Signal interruptions are retried. Any other error (`WouldBlock` on a
  /// non-blocking listener included) is returned and leaves the listener
  /// usable. The accepted connection resets instead of lingering when closed
  /// (`SO_LINGER` on with a zero timeout) and has keepalive enabled.
  pub fn accept(&self) -> io::Result<Connection> {
    let (socket, peer) = self.socket.accept().inspect_err(|err| {
      if err.kind() == io::ErrorKind::WouldBlock {
        trace!(fd = ?self.fd(), "no pending connection");
      } else {
        error!(fd = ?self.fd(), error = %err, "accept failed");
      }
    })?;

    if let Err(err) = socket.set_linger(Some(Duration::ZERO)) {
      error!(fd = ?socket.fd(), error = %err, "set linger failed");
    }

    let conn = Connection::new(socket, Role::Accepted, Some(peer));
    conn.set_keepalive(true);
    debug!(fd = ?conn.fd(), %peer, "accepted");
    Ok(conn)
  }

  /// Toggles `TCP_NODELAY`. Failures are logged, not returned.
  pub fn set_nodelay(&self, enable: bool) {
    if let Err(err) = self.socket.set_nodelay(enable) {
      warn!(fd = ?self.fd(), enable, error = %err, "TCP_NODELAY not applied");
    }
  }

  /// Toggles `SO_KEEPALIVE`. Failures are logged, not returned.
  pub fn set_keepalive(&self, enable: bool) {
    if let Err(err) = self.socket.set_keepalive(enable) {
      warn!(fd = ?self.fd(), enable, error = %err, "SO_KEEPALIVE not applied");
    }
  }

  /// Switches between blocking and non-blocking mode.
  ///
  /// The mode decides how [`read`](Self::read) behaves. It is recorded even
  /// if the descriptor flags cannot be updated; that failure is only logged.
  pub fn set_nonblocking(&mut self, enable: bool) {
    self.nonblocking = enable;
    if let Err(err) = self.socket.set_nonblocking(enable) {
      warn!(fd = ?self.fd(), enable, error = %err, "O_NONBLOCK not applied");
    }
  }

  /// Mode last set by [`set_nonblocking`](Self::set_nonblocking).
  pub fn is_nonblocking(&self) -> bool {
    self.nonblocking
  }

  /// Current `TCP_NODELAY` setting as reported by the kernel.
  pub fn nodelay(&self) -> io::Result<bool> {
    self.socket.nodelay()
  }

  /// Current `SO_KEEPALIVE` setting as reported by the kernel.
  pub fn keepalive(&self) -> io::Result<bool> {
    self.socket.keepalive()
  }

  /// Current `SO_LINGER` setting; `None` when lingering is off.
  pub fn linger(&self) -> io::Result<Option<Duration>> {
    self.socket.linger()
  }

  /// Reads from the socket and appends what arrives to [`buffer`](Self::buffer).
  ///
  /// In blocking mode a single read is issued, which may wait indefinitely.
  /// In non-blocking mode reads are repeated until the socket runs dry, and
  /// the bytes appended across all of them are reported.
  ///
  /// End of stream yields [`Received::Closed`]. In non-blocking mode that
  /// holds even when earlier reads of the same call already appended data:
  /// those bytes stay in the buffer but are not counted in the result.
  ///
  /// `EINTR` is retried and `EWOULDBLOCK` ends the call. Other errors are
  /// returned as is, a reset peer as `ConnectionReset`.
  pub fn read(&mut self) -> io::Result<Received> {
    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0;

    loop {
      match self.socket.read(&mut chunk) {
        Ok(0) => {
          debug!(fd = ?self.fd(), dropped = total, "peer closed");
          return Ok(Received::Closed);
        }
        Ok(n) => {
          self.inbound.append(&chunk[..n]);
          total += n;
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
        Err(err) => {
          debug!(fd = ?self.fd(), error = %err, "read failed");
          return Err(err);
        }
      }

      if !self.nonblocking {
        break;
      }
    }

    trace!(fd = ?self.fd(), read = total, buffered = self.inbound.len());
    Ok(Received::Bytes(total))
  }

  /// Closes the descriptor. Calling it again, or dropping afterwards, is a
  /// no-op.
  pub fn close(&mut self) {
    let fd = self.fd();
    if self.socket.close() {
      trace!(fd = ?fd, "closed");
    }
  }

  /// `false` once [`close`](Self::close) has run.
  pub fn is_open(&self) -> bool {
    self.socket.fd().is_some()
  }

  /// The underlying descriptor, `None` once closed.
  pub fn fd(&self) -> Option<RawFd> {
    self.socket.fd()
  }

  /// Releases the descriptor to the caller without closing it.
  pub fn into_raw_fd(mut self) -> Option<RawFd> {
    self.socket.into_raw()
  }

  /// Which constructor produced this connection.
  pub fn role(&self) -> Role {
    self.role
  }

  /// Shorthand for `role() == Role::Listener`.
  pub fn is_listener(&self) -> bool {
    self.role == Role::Listener
  }

  /// Remote address for connected sockets, the bound address for listeners.
  pub fn peer_addr(&self) -> Option<SocketAddrV4> {
    self.peer
  }

  /// Address part of [`peer_addr`](Self::peer_addr).
  pub fn peer_ip(&self) -> Option<Ipv4Addr> {
    self.peer.map(|addr| *addr.ip())
  }

  /// Port part of [`peer_addr`](Self::peer_addr).
  pub fn peer_port(&self) -> Option<u16> {
    self.peer.map(|addr| addr.port())
  }

  /// Bytes read so far and not yet consumed.
  pub fn buffer(&self) -> &Buffer {
    &self.inbound
  }

  /// Mutable access for consuming or clearing buffered bytes.
  pub fn buffer_mut(&mut self) -> &mut Buffer {
    &mut self.inbound
  }
}

impl FromRawFd for Connection {
  /// Adopts an open stream socket. The connection starts in blocking mode
  /// as far as [`Connection::read`] is concerned, whatever the descriptor's
  /// flags are, and has no known peer.
  unsafe fn from_raw_fd(fd: RawFd) -> Self {
    // SAFETY: forwarded to the caller.
    let socket = unsafe { Socket::from_raw_fd(fd) };
    Connection::new(socket, Role::Adopted, None)
  }
}

impl Drop for Connection {
  fn drop(&mut self) {
    self.close();
  }
}

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection")
      .field("fd", &self.fd())
      .field("role", &self.role)
      .field("peer", &self.peer)
      .field("nonblocking", &self.nonblocking)
      .field("buffered", &self.inbound.len())
      .finish()
  }
}
