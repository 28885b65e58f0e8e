//! Server assembly: accept loop and upgrade dispatch
//!
//! The listener's accept loop is the one long-lived task; every
//! accepted connection runs in its own task, and nothing that happens
//! inside one of those tasks can take the listener or another
//! connection down.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::handler::{BoxedHandler, EchoHandler, Handler};
use crate::listener::TlsListener;
use resound_core::error::{Error, HandshakeError, Result};
use resound_core::handshake::{self, UpgradeRequest};
use resound_core::protocol::handshake::MAX_REQUEST_HEAD;
use resound_core::transport::TransportStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// The WebSocket echo server.
pub struct Server {
    config: ServerConfig,
    handler: BoxedHandler,
}

impl Server {
    /// Create a server from a validated configuration and handler.
    pub fn new(config: ServerConfig, handler: BoxedHandler) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, handler })
    }

    /// Start building a server.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Bind the listener and serve until the process is terminated.
    pub async fn serve(self) -> Result<()> {
        let listener = TlsListener::bind(&self.config).await?;
        self.serve_with_listener(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_with_listener(self, listener: TlsListener) -> Result<()> {
        info!(addr = %listener.local_addr(), path = %self.config.upgrade_path, "listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok(session) => {
                            let peer = match session.peer_addr() {
                                Ok(addr) => addr,
                                Err(e) => {
                                    error!(error = %e, "no peer address, dropping connection");
                                    continue;
                                }
                            };
                            debug!(%peer, "accepted TLS connection");

                            let config = self.config.clone();
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_session(Box::new(session), &config, &handler).await
                                {
                                    // Isolated to this connection; the listener keeps going
                                    warn!(%peer, error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            // TLS handshake or accept failure on one socket
                            error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Drive one accepted stream from request head to session end.
///
/// Non-upgrade requests get the bodyless `200 OK` the original server
/// sent; malformed upgrade attempts get a `400` and are closed; valid
/// upgrades hand the connection to the handler.
pub async fn handle_session(
    mut stream: Box<dyn TransportStream>,
    config: &ServerConfig,
    handler: &BoxedHandler,
) -> Result<()> {
    let peer = stream.peer_addr()?;

    let (head, buffered) = match read_request_head(&mut stream, config).await {
        Ok(head) => head,
        Err(e) => {
            let _ = stream.close().await;
            return Err(e);
        }
    };

    let request = match UpgradeRequest::parse(&head) {
        Ok(request) => request,
        Err(e) => {
            let _ = stream.write_all(handshake::bad_request().as_bytes()).await;
            let _ = stream.close().await;
            return Err(e);
        }
    };

    if request.path != config.upgrade_path || !request.wants_upgrade() {
        debug!(%peer, path = %request.path, "plain HTTP request, answering 200");
        stream.write_all(handshake::plain_ok().as_bytes()).await?;
        stream.flush().await?;
        stream.close().await?;
        return Ok(());
    }

    let key = match request.validate() {
        Ok(key) => key,
        Err(e) => {
            warn!(%peer, error = %e, "rejecting malformed upgrade");
            let _ = stream.write_all(handshake::bad_request().as_bytes()).await;
            let _ = stream.close().await;
            return Err(e);
        }
    };

    let accept = handshake::accept_key(key);
    stream
        .write_all(handshake::switching_protocols(&accept).as_bytes())
        .await?;
    stream.flush().await?;

    debug!(%peer, "upgraded to WebSocket");
    let mut connection = Connection::new(stream, peer, config.max_frame_size);
    connection.feed(&buffered);
    handler.handle(connection).await
}

/// Read the request head through the terminating blank line.
///
/// Returns the head and any frame bytes the client pipelined after it.
async fn read_request_head(
    stream: &mut Box<dyn TransportStream>,
    config: &ServerConfig,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let read_head = async {
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Handshake(HandshakeError::MalformedRequest(
                    "connection closed before request head".into(),
                )));
            }
            head.extend_from_slice(&chunk[..n]);

            if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
                let rest = head.split_off(pos + 4);
                return Ok((head, rest));
            }
            if head.len() > MAX_REQUEST_HEAD {
                return Err(Error::Handshake(HandshakeError::RequestTooLarge {
                    max: MAX_REQUEST_HEAD,
                }));
            }
        }
    };

    match timeout(config.handshake_timeout, read_head).await {
        Ok(result) => result,
        Err(_) => Err(Error::Handshake(HandshakeError::Timeout)),
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    bind_address: Option<std::net::SocketAddr>,
    cert_file: Option<std::path::PathBuf>,
    key_file: Option<std::path::PathBuf>,
    upgrade_path: Option<String>,
    handshake_timeout: Option<std::time::Duration>,
    max_frame_size: Option<usize>,
}

impl ServerBuilder {
    /// Set the bind address.
    pub fn bind(mut self, addr: std::net::SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set the PEM certificate and private key paths.
    pub fn tls(
        mut self,
        cert_file: impl Into<std::path::PathBuf>,
        key_file: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.cert_file = Some(cert_file.into());
        self.key_file = Some(key_file.into());
        self
    }

    /// Set the upgrade path.
    pub fn upgrade_path(mut self, path: impl Into<String>) -> Self {
        self.upgrade_path = Some(path.into());
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Set the maximum frame payload size.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    fn into_config(self) -> Result<ServerConfig> {
        let cert_file = self.cert_file.ok_or_else(|| {
            Error::Config(resound_core::ConfigError::Validation(
                "certificate path is required".into(),
            ))
        })?;
        let key_file = self.key_file.ok_or_else(|| {
            Error::Config(resound_core::ConfigError::Validation(
                "private key path is required".into(),
            ))
        })?;

        let mut config = ServerConfig::new(cert_file, key_file);
        if let Some(addr) = self.bind_address {
            config.bind_address = addr;
        }
        if let Some(path) = self.upgrade_path {
            config.upgrade_path = path;
        }
        if let Some(timeout) = self.handshake_timeout {
            config.handshake_timeout = timeout;
        }
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = size;
        }
        Ok(config)
    }

    /// Build with the default echo handler.
    pub fn build(self) -> Result<Server> {
        Server::new(self.into_config()?, Box::new(EchoHandler::new()))
    }

    /// Build with a custom handler.
    pub fn build_with_handler<H>(self, handler: H) -> Result<Server>
    where
        H: Handler,
    {
        Server::new(self.into_config()?, Box::new(handler))
    }
}
