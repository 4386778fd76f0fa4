use std::{
  io, mem,
  net::{Ipv4Addr, SocketAddrV4},
};

/// Parses a dotted-decimal IPv4 literal. No name resolution is attempted.
pub(crate) fn parse_ipv4(ip: &str, port: u16) -> io::Result<SocketAddrV4> {
  let addr: Ipv4Addr = ip.parse().map_err(|_| {
    io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("not a dotted-decimal IPv4 address: {ip:?}"),
    )
  })?;
  Ok(SocketAddrV4::new(addr, port))
}

pub(crate) fn into_sockaddr_in(addr: SocketAddrV4) -> libc::sockaddr_in {
  // SAFETY: sockaddr_in is a C struct with primitive integer fields.
  // Zero-initialization is safe - all fields accept zero as a valid value.
  let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };

  #[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
  ))]
  {
    raw.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
  }
  raw.sin_family = libc::AF_INET as libc::sa_family_t;
  raw.sin_port = addr.port().to_be();
  raw.sin_addr = libc::in_addr { s_addr: u32::from(*addr.ip()).to_be() };

  raw
}

/// Reverse of [`into_sockaddr_in`], used on addresses filled in by the kernel.
pub(crate) fn from_sockaddr_in(raw: &libc::sockaddr_in) -> io::Result<SocketAddrV4> {
  if raw.sin_family != libc::AF_INET as libc::sa_family_t {
    return Err(io::Error::from_raw_os_error(libc::EAFNOSUPPORT));
  }
  let ip = Ipv4Addr::from(u32::from_be(raw.sin_addr.s_addr));
  Ok(SocketAddrV4::new(ip, u16::from_be(raw.sin_port)))
}
