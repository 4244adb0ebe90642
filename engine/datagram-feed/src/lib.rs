//! # datagram-feed
//!
//! Sends the concatenated raw-record payload for one jiffy as a single
//! unreliable datagram to a fixed destination. Send-and-forget: failures are
//! counted, never retried, and never stop the session. Receivers split the
//! payload by the fixed record length; there is no framing.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use record_index::{Record, RECORD_SIZE};

/// Default destination, matching the historical receiver port.
pub const DEFAULT_DEST_PORT: u16 = 9000;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("datagram socket setup: {0}")]
    Socket(#[from] std::io::Error),
}

/// Configuration for the datagram feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Fixed destination for every batch.
    pub dest: SocketAddr,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dest: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_DEST_PORT)),
        }
    }
}

/// One connected UDP socket plus delivery counters.
#[derive(Debug)]
pub struct DatagramFeed {
    socket: UdpSocket,
    dest: SocketAddr,
    sent: u64,
    failed: u64,
}

impl DatagramFeed {
    /// Bind an ephemeral local socket and connect it to the destination.
    /// Failure here is fatal at startup; failures later are not.
    pub fn connect(config: FeedConfig) -> Result<Self, FeedError> {
        let bind_addr: SocketAddr = if config.dest.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(config.dest)?;
        tracing::info!(dest = %config.dest, "datagram feed connected");
        Ok(Self { socket, dest: config.dest, sent: 0, failed: 0 })
    }

    /// Send one jiffy's records as a single datagram: whole raw records
    /// concatenated in bucket order. Returns whether the send succeeded.
    pub fn send_batch(&mut self, records: &[Record]) -> bool {
        if records.is_empty() {
            return true;
        }
        let mut payload = Vec::with_capacity(records.len() * RECORD_SIZE);
        for record in records {
            payload.extend_from_slice(record.as_bytes());
        }
        match self.socket.send(&payload) {
            Ok(_) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                self.failed += 1;
                tracing::debug!(dest = %self.dest, error = %e, "datagram send failed");
                false
            }
        }
    }

    /// Datagrams delivered to the socket so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Sends that returned an error (counted, never retried).
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Zero the per-day counters.
    pub fn reset_counters(&mut self) {
        self.sent = 0;
        self.failed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record_with(jiffy: u64) -> Record {
        let mut bytes = [b'.'; RECORD_SIZE];
        let key = format!("{jiffy:014}");
        bytes[22..36].copy_from_slice(key.as_bytes());
        Record::new(bytes)
    }

    fn local_receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[test]
    fn batch_is_one_datagram_of_concatenated_records() {
        let (receiver, addr) = local_receiver();
        let mut feed = DatagramFeed::connect(FeedConfig { dest: addr }).unwrap();

        let batch = vec![record_with(100), record_with(100), record_with(100)];
        assert!(feed.send_batch(&batch));
        assert_eq!(feed.sent(), 1);

        let mut buf = [0u8; 1024];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(n, 3 * RECORD_SIZE);
        assert_eq!(&buf[..RECORD_SIZE], record_with(100).as_bytes());
    }

    #[test]
    fn empty_batch_sends_nothing() {
        let (_receiver, addr) = local_receiver();
        let mut feed = DatagramFeed::connect(FeedConfig { dest: addr }).unwrap();
        assert!(feed.send_batch(&[]));
        assert_eq!(feed.sent(), 0);
        assert_eq!(feed.failed(), 0);
    }
}
