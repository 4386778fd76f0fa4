use std::{
  io, mem,
  net::SocketAddrV4,
  os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
  time::Duration,
};

use crate::net_utils::{from_sockaddr_in, into_sockaddr_in};

/// Single-owner IPv4 stream socket.
///
/// The descriptor is closed exactly once: by [`Socket::close`] or on drop,
/// whichever comes first. Every operation on a closed socket fails with
/// `EBADF` without reaching the kernel.
pub(crate) struct Socket(Option<OwnedFd>);

impl FromRawFd for Socket {
  unsafe fn from_raw_fd(fd: RawFd) -> Self {
    // SAFETY: forwarded to the caller.
    Socket(Some(unsafe { OwnedFd::from_raw_fd(fd) }))
  }
}

impl Socket {
  /// Creates a close-on-exec `AF_INET`/`SOCK_STREAM` socket.
  pub(crate) fn stream() -> io::Result<Self> {
    #[cfg(atomic_cloexec)]
    let fd = syscall!(socket(
      libc::AF_INET,
      libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
      0
    ))?;

    #[cfg(not(atomic_cloexec))]
    let fd = syscall!(socket(libc::AF_INET, libc::SOCK_STREAM, 0))?;

    // SAFETY: 'fd' was just returned by socket(2) and nothing else owns it.
    let socket = unsafe { Socket::from_raw_fd(fd) };

    #[cfg(not(atomic_cloexec))]
    socket.set_cloexec()?;

    Ok(socket)
  }

  #[cfg(not(atomic_cloexec))]
  fn set_cloexec(&self) -> io::Result<()> {
    syscall!(fcntl(self.raw()?, libc::F_SETFD, libc::FD_CLOEXEC))?;
    Ok(())
  }

  pub(crate) fn fd(&self) -> Option<RawFd> {
    self.0.as_ref().map(AsRawFd::as_raw_fd)
  }

  fn raw(&self) -> io::Result<RawFd> {
    self.fd().ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
  }

  /// Closes the descriptor if it is still open. Returns whether it was.
  pub(crate) fn close(&mut self) -> bool {
    self.0.take().is_some()
  }

  /// Gives up ownership without closing.
  pub(crate) fn into_raw(&mut self) -> Option<RawFd> {
    self.0.take().map(IntoRawFd::into_raw_fd)
  }

  pub(crate) fn connect(&self, addr: SocketAddrV4) -> io::Result<()> {
    let raw = into_sockaddr_in(addr);
    syscall!(connect(
      self.raw()?,
      &raw as *const libc::sockaddr_in as *const libc::sockaddr,
      mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
    ))?;
    Ok(())
  }

  pub(crate) fn bind(&self, addr: SocketAddrV4) -> io::Result<()> {
    let raw = into_sockaddr_in(addr);
    syscall!(bind(
      self.raw()?,
      &raw as *const libc::sockaddr_in as *const libc::sockaddr,
      mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
    ))?;
    Ok(())
  }

  pub(crate) fn listen(&self, backlog: libc::c_int) -> io::Result<()> {
    syscall!(listen(self.raw()?, backlog))?;
    Ok(())
  }

  /// Accepts one pending connection, restarting on `EINTR`.
  ///
  /// The new descriptor is close-on-exec and starts out in blocking mode on
  /// Linux; BSD-derived systems copy `O_NONBLOCK` from the listener.
  pub(crate) fn accept(&self) -> io::Result<(Socket, SocketAddrV4)> {
    let fd = self.raw()?;
    // SAFETY: all-zero is a valid sockaddr_in.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

    #[cfg(atomic_cloexec)]
    let client = syscall_restart!(accept4(
      fd,
      &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
      &mut len,
      libc::SOCK_CLOEXEC
    ))?;

    #[cfg(not(atomic_cloexec))]
    let client = syscall_restart!(accept(
      fd,
      &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
      &mut len
    ))?;

    // SAFETY: accept returned a fresh descriptor we are the only owner of.
    let socket = unsafe { Socket::from_raw_fd(client) };

    #[cfg(not(atomic_cloexec))]
    socket.set_cloexec()?;

    let peer = from_sockaddr_in(&addr)?;
    Ok((socket, peer))
  }

  /// One `read(2)` into `buf`, restarting on `EINTR`. `Ok(0)` is end of
  /// stream.
  pub(crate) fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
    let fd = self.raw()?;
    let n = syscall_restart!(read(
      fd,
      buf.as_mut_ptr() as *mut libc::c_void,
      buf.len()
    ))?;
    Ok(n as usize)
  }

  /// Sets or clears `O_NONBLOCK`, leaving the other status flags alone.
  pub(crate) fn set_nonblocking(&self, enable: bool) -> io::Result<()> {
    let fd = self.raw()?;
    let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
    let next = if enable {
      flags | libc::O_NONBLOCK
    } else {
      flags & !libc::O_NONBLOCK
    };
    if next != flags {
      syscall!(fcntl(fd, libc::F_SETFL, next))?;
    }
    Ok(())
  }

  #[cfg(test)]
  fn is_nonblocking(&self) -> io::Result<bool> {
    let flags = syscall!(fcntl(self.raw()?, libc::F_GETFL))?;
    Ok(flags & libc::O_NONBLOCK != 0)
  }

  pub(crate) fn set_reuse_address(&self, enable: bool) -> io::Result<()> {
    self.set_opt(libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int)
  }

  pub(crate) fn set_keepalive(&self, enable: bool) -> io::Result<()> {
    self.set_opt(libc::SOL_SOCKET, libc::SO_KEEPALIVE, enable as libc::c_int)
  }

  pub(crate) fn keepalive(&self) -> io::Result<bool> {
    Ok(self.int_opt(libc::SOL_SOCKET, libc::SO_KEEPALIVE)? != 0)
  }

  pub(crate) fn set_nodelay(&self, enable: bool) -> io::Result<()> {
    self.set_opt(libc::IPPROTO_TCP, libc::TCP_NODELAY, enable as libc::c_int)
  }

  pub(crate) fn nodelay(&self) -> io::Result<bool> {
    Ok(self.int_opt(libc::IPPROTO_TCP, libc::TCP_NODELAY)? != 0)
  }

  /// `None` turns lingering off, `Some(Duration::ZERO)` makes close(2) reset
  /// the connection and drop unsent data.
  pub(crate) fn set_linger(&self, linger: Option<Duration>) -> io::Result<()> {
    let value = libc::linger {
      l_onoff: linger.is_some() as libc::c_int,
      l_linger: linger.map_or(0, |d| d.as_secs() as libc::c_int),
    };
    self.set_opt(libc::SOL_SOCKET, libc::SO_LINGER, value)
  }

  pub(crate) fn linger(&self) -> io::Result<Option<Duration>> {
    let mut value = libc::linger { l_onoff: 0, l_linger: 0 };
    let mut len = mem::size_of::<libc::linger>() as libc::socklen_t;
    syscall!(getsockopt(
      self.raw()?,
      libc::SOL_SOCKET,
      libc::SO_LINGER,
      &mut value as *mut libc::linger as *mut libc::c_void,
      &mut len
    ))?;
    Ok(
      (value.l_onoff != 0)
        .then(|| Duration::from_secs(value.l_linger.max(0) as u64)),
    )
  }

  fn set_opt<T>(
    &self,
    level: libc::c_int,
    name: libc::c_int,
    value: T,
  ) -> io::Result<()> {
    syscall!(setsockopt(
      self.raw()?,
      level,
      name,
      &value as *const T as *const libc::c_void,
      mem::size_of::<T>() as libc::socklen_t
    ))?;
    Ok(())
  }

  fn int_opt(
    &self,
    level: libc::c_int,
    name: libc::c_int,
  ) -> io::Result<libc::c_int> {
    let mut value: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    syscall!(getsockopt(
      self.raw()?,
      level,
      name,
      &mut value as *mut libc::c_int as *mut libc::c_void,
      &mut len
    ))?;
    Ok(value)
  }
}
