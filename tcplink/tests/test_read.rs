mod common;

use std::{thread, time::Duration, time::Instant};

use common::{connected_pair, deadline, settle, wait_readable, write_all};
use proptest::prelude::*;
use tcplink::{Connection, READ_CHUNK, Received};

/// Reads until `want` bytes are buffered, failing on close or timeout.
fn read_until(conn: &mut Connection, want: usize, until: Instant) {
  while conn.buffer().len() < want {
    match conn.read().expect("read failed") {
      Received::Closed => panic!("peer closed after {} bytes", conn.buffer().len()),
      Received::Bytes(_) => {}
    }
    assert!(Instant::now() < until, "timed out at {} of {want} bytes", conn.buffer().len());
    thread::sleep(Duration::from_millis(1));
  }
}

#[test]
fn test_read_ping_blocking() {
  let (_listener, client, mut server) = connected_pair(18888);

  write_all(client.fd().unwrap(), b"ping");

  assert_eq!(server.read().unwrap(), Received::Bytes(4));
  assert_eq!(server.buffer().as_slice(), b"ping");
}

#[test]
fn test_read_nonblocking_without_data() {
  let (_listener, _client, mut server) = connected_pair(18930);

  server.set_nonblocking(true);
  assert!(server.is_nonblocking());

  assert_eq!(server.read().unwrap(), Received::Bytes(0));
  assert!(server.buffer().is_empty());
}

#[test]
fn test_read_orderly_shutdown() {
  let (_listener, mut client, mut server) = connected_pair(18931);

  client.close();
  assert_eq!(server.read().unwrap(), Received::Closed);
  assert_eq!(server.read().unwrap().count(), 0);
}

#[test]
fn test_read_reset_is_an_error() {
  let (_listener, mut client, mut server) = connected_pair(18932);

  // The accepted end has a zero linger, so closing it resets the client.
  server.close();
  assert!(client.read().is_err());
}

#[test]
fn test_read_nonblocking_close_after_data() {
  let (_listener, mut client, mut server) = connected_pair(18933);

  write_all(client.fd().unwrap(), b"abc");
  client.close();
  assert!(wait_readable(server.fd().unwrap(), Duration::from_secs(5)));
  settle();

  // Bytes and end of stream arrive in the same call: the call reports the
  // close and the bytes only show up in the buffer.
  server.set_nonblocking(true);
  assert_eq!(server.read().unwrap(), Received::Closed);
  assert_eq!(server.buffer().as_slice(), b"abc");
}

#[test]
fn test_read_blocking_is_one_chunk_at_most() {
  let (_listener, client, mut server) = connected_pair(18934);

  let payload = vec![7u8; READ_CHUNK * 3];
  write_all(client.fd().unwrap(), &payload);
  assert!(wait_readable(server.fd().unwrap(), Duration::from_secs(5)));
  settle();

  let got = server.read().unwrap().count();
  assert!(got > 0 && got <= READ_CHUNK, "read {got}");
  assert_eq!(server.buffer().len(), got);
}

#[test]
fn test_read_nonblocking_drains_many_chunks() {
  let (_listener, client, mut server) = connected_pair(18935);
  server.set_nonblocking(true);

  let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
  let fd = client.fd().unwrap();
  let writer = {
    let payload = payload.clone();
    thread::spawn(move || write_all(fd, &payload))
  };

  read_until(&mut server, payload.len(), deadline(10));
  writer.join().unwrap();

  assert_eq!(server.buffer().as_slice(), &payload[..]);
  assert_eq!(server.read().unwrap(), Received::Bytes(0));
}

#[test]
fn test_read_appends_across_calls() {
  let (_listener, client, mut server) = connected_pair(18936);
  let fd = client.fd().unwrap();

  write_all(fd, b"hello ");
  assert_eq!(server.read().unwrap(), Received::Bytes(6));
  write_all(fd, b"world");
  assert_eq!(server.read().unwrap(), Received::Bytes(5));
  assert_eq!(server.buffer().as_slice(), b"hello world");

  server.buffer_mut().consume(6);
  assert_eq!(server.buffer().as_slice(), b"world");
}

#[test]
fn test_read_switch_back_to_blocking() {
  let (_listener, client, mut server) = connected_pair(18937);

  server.set_nonblocking(true);
  assert_eq!(server.read().unwrap(), Received::Bytes(0));
  server.set_nonblocking(false);

  let fd = client.fd().unwrap();
  let writer = thread::spawn(move || {
    thread::sleep(Duration::from_millis(100));
    write_all(fd, b"late");
  });

  // Blocks until the delayed write lands.
  assert_eq!(server.read().unwrap(), Received::Bytes(4));
  writer.join().unwrap();
  drop(client);
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(16))]

  #[test]
  fn prop_test_nonblocking_read_accumulates_fragmented_writes(
    data in prop::collection::vec(any::<u8>(), 1..=40_000),
    pieces in 1usize..=12,
    seed in any::<u64>(),
  ) {
    let (_listener, client, mut server) = connected_pair(18938);
    server.set_nonblocking(true);

    // Split into `pieces` writes at random boundaries.
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut cuts: Vec<usize> = (1..pieces).map(|_| rng.usize(0..=data.len())).collect();
    cuts.push(0);
    cuts.push(data.len());
    cuts.sort_unstable();

    let fd = client.fd().unwrap();
    let writer = {
      let data = data.clone();
      thread::spawn(move || {
        for window in cuts.windows(2) {
          write_all(fd, &data[window[0]..window[1]]);
          thread::sleep(Duration::from_micros(200));
        }
      })
    };

    read_until(&mut server, data.len(), deadline(10));
    writer.join().unwrap();

    prop_assert_eq!(server.buffer().len(), data.len());
    prop_assert_eq!(server.buffer().as_slice(), &data[..]);
  }
}
