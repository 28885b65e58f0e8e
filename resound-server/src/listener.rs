//! TLS-terminated transport listener
//!
//! Owns the one piece of process-wide state: the bound listening
//! socket. Binding failures are fatal; per-connection TLS handshake
//! failures are returned to the accept loop, which logs and keeps
//! accepting.

use crate::config::{build_rustls_server_config, ServerConfig};
use resound_core::error::{Error, Result};
use resound_core::transport::TransportStream;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{server::TlsStream, TlsAcceptor};

/// TCP listener with TLS termination.
pub struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    local_addr: SocketAddr,
}

impl TlsListener {
    /// Load the TLS material and bind the configured address.
    ///
    /// Fails with `Error::Config` when the certificate or key is
    /// unreadable or malformed, and `Error::Bind` when the port is
    /// unavailable.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let tls_config = build_rustls_server_config(config)?;

        let listener = TcpListener::bind(config.bind_address)
            .await
            .map_err(Error::Bind)?;
        let local_addr = listener.local_addr().map_err(Error::Bind)?;

        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            local_addr,
        })
    }

    /// Accept one connection and complete its TLS handshake.
    pub async fn accept(&self) -> Result<TlsSession> {
        let (tcp_stream, peer_addr) = self.listener.accept().await?;
        let tls_stream = self.acceptor.accept(tcp_stream).await?;
        Ok(TlsSession {
            inner: tls_stream,
            peer_addr,
        })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TlsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsListener")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// One accepted, TLS-established connection.
pub struct TlsSession {
    inner: TlsStream<TcpStream>,
    peer_addr: SocketAddr,
}

#[async_trait::async_trait]
impl TransportStream for TlsSession {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.inner.read(buf).await?)
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(buf).await?)
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush().await?)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(self.inner.shutdown().await?)
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.peer_addr)
    }
}
