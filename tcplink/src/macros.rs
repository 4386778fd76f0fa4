/// Calls a `libc` function and turns the `-1` convention into an
/// [`io::Result`](std::io::Result), capturing `errno` right away.
macro_rules! syscall {
  ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
      #[allow(unused_unsafe)]
      let res = unsafe { libc::$fn($($arg, )*) };
      if res == -1 {
          Err(std::io::Error::last_os_error())
      } else {
          Ok(res)
      }
  }};
}

/// Same as [`syscall!`] but reissues the call for as long as it fails with
/// `EINTR`.
macro_rules! syscall_restart {
  ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
    loop {
      match syscall!($fn($($arg),*)) {
        Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
        res => break res,
      }
    }
  }};
}
