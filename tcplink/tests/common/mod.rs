#![allow(dead_code)]

use std::{
  os::fd::RawFd,
  sync::Once,
  thread,
  time::{Duration, Instant},
};

use tcplink::Connection;

pub const LOCALHOST: &str = "127.0.0.1";

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
  static INIT: Once = Once::new();
  INIT.call_once(|| {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  });
}

/// Listener on `port`, a client connected to it and the accepted end.
pub fn connected_pair(port: u16) -> (Connection, Connection, Connection) {
  init_tracing();
  let listener = Connection::listen(LOCALHOST, port).expect("listen failed");
  let client = Connection::connect(LOCALHOST, port).expect("connect failed");
  let server = listener.accept().expect("accept failed");
  (listener, client, server)
}

/// Writes all of `data` to `fd`, looping over short writes.
pub fn write_all(fd: RawFd, mut data: &[u8]) {
  while !data.is_empty() {
    let n = unsafe {
      libc::write(fd, data.as_ptr() as *const libc::c_void, data.len())
    };
    if n < 0 {
      let err = std::io::Error::last_os_error();
      if err.kind() == std::io::ErrorKind::Interrupted {
        continue;
      }
      panic!("write failed: {err}");
    }
    data = &data[n as usize..];
  }
}

/// Blocks until `fd` is readable (data, EOF or error) or `timeout` passes.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> bool {
  let mut pfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
  let ret = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
  ret > 0
}

/// Gives in-flight loopback segments a moment to land.
pub fn settle() {
  thread::sleep(Duration::from_millis(50));
}

pub fn deadline(secs: u64) -> Instant {
  Instant::now() + Duration::from_secs(secs)
}
