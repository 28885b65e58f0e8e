//! Transport stream abstraction
//!
//! The session loop in the server crate runs against this trait so it
//! can drive a TLS stream in production and an in-memory stream in
//! tests without caring which.

use crate::error::Result;
use std::net::SocketAddr;

/// A bidirectional byte stream carrying one connection.
#[async_trait::async_trait]
pub trait TransportStream: Send {
    /// Read into `buf`, returning 0 at EOF.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer.
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered writes.
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the write side.
    async fn close(&mut self) -> Result<()>;

    /// Address of the peer.
    fn peer_addr(&self) -> Result<SocketAddr>;
}
