//! Inbound byte store.
//!
//! Every [`Connection`](crate::Connection) owns one [`Buffer`]. Reads only
//! ever [`append`](Buffer::append) to it; whoever inspects the data decides
//! when to [`consume`](Buffer::consume) or [`clear`](Buffer::clear) it.
//!
//! ```rust
//! use tcplink::buf::Buffer;
//!
//! let mut buf = Buffer::new();
//! buf.append(b"GET / HTTP/1.1\r\n");
//! buf.append(b"\r\n");
//!
//! let line_end = buf.iter().position(|b| *b == b'\n').unwrap();
//! assert_eq!(&buf[..line_end + 1], b"GET / HTTP/1.1\r\n");
//! buf.consume(line_end + 1);
//! assert_eq!(buf.as_slice(), b"\r\n");
//! ```

use std::{fmt, ops::Deref};

/// Append-only, growable byte store.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buffer {
  data: Vec<u8>,
}

impl Buffer {
  pub fn new() -> Self {
    Self { data: Vec::new() }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self { data: Vec::with_capacity(capacity) }
  }

  /// Appends `bytes` at the end. Never truncates.
  pub fn append(&mut self, bytes: &[u8]) {
    self.data.extend_from_slice(bytes);
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  /// Drops the first `n` bytes (all of them if `n` exceeds the length).
  pub fn consume(&mut self, n: usize) {
    let n = n.min(self.data.len());
    self.data.drain(..n);
  }

  pub fn clear(&mut self) {
    self.data.clear();
  }

  /// Moves the buffered bytes out as [`bytes::Bytes`], leaving the buffer
  /// empty.
  #[cfg(feature = "bytes")]
  #[cfg_attr(docsrs, doc(cfg(feature = "bytes")))]
  pub fn split_bytes(&mut self) -> bytes::Bytes {
    bytes::Bytes::from(std::mem::take(&mut self.data))
  }
}

impl Deref for Buffer {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &self.data
  }
}

impl AsRef<[u8]> for Buffer {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl From<Buffer> for Vec<u8> {
  fn from(value: Buffer) -> Self {
    value.data
  }
}

impl fmt::Debug for Buffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Buffer").field("len", &self.data.len()).finish()
  }
}
