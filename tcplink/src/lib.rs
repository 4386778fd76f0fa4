#![cfg(unix)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tcplink - owned IPv4 TCP connections
//!
//! `tcplink` wraps one socket descriptor per [`Connection`] and reads from
//! it into an owned, append-only [`Buffer`](buf::Buffer). There are three
//! ways to get a connection:
//!
//! - [`Connection::connect`] dials a peer,
//! - [`Connection::listen`] binds a listening socket,
//! - [`Connection::accept`] takes the next peer off a listener.
//!
//! Failed construction never leaks a descriptor, and a connection closes
//! its descriptor exactly once.
//!
//! ## Reading
//!
//! ```rust,no_run
//! use tcplink::{Connection, Received};
//!
//! fn drain(conn: &mut Connection) -> std::io::Result<()> {
//!     conn.set_nonblocking(true);
//!     match conn.read()? {
//!         Received::Bytes(0) => println!("nothing yet"),
//!         Received::Bytes(n) => println!("got {n} bytes"),
//!         Received::Closed => println!("peer hung up"),
//!     }
//!     let data = conn.buffer().as_slice().to_vec();
//!     conn.buffer_mut().consume(data.len());
//!     Ok(())
//! }
//! ```
//!
//! There is no event loop here: callers that need timeouts wait for
//! readiness on [`Connection::fd`] themselves before calling
//! [`Connection::read`].
//!
//! ## Addresses
//!
//! Only dotted-decimal IPv4 literals are accepted. Hostnames are rejected
//! with [`std::io::ErrorKind::InvalidInput`].
//!
//! ## Error Handling
//!
//! Fallible operations return [`std::io::Result`] carrying the OS error.
//! Socket option setters are best effort and only log failures through
//! [`tracing`].

#[macro_use]
mod macros;

pub mod buf;
mod conn;
mod net_utils;
mod socket;

pub use buf::Buffer;
pub use conn::{BACKLOG, Connection, READ_CHUNK, Received, Role};
