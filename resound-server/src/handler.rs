//! Session handlers
//!
//! A handler owns an upgraded connection for its whole life. The only
//! handler this endpoint ships is the echo handler, which answers each
//! inbound message with the fixed `"Receive: "` label plus the message
//! content.

use crate::connection::Connection;
use bytes::{BufMut, BytesMut};
use resound_core::message::Message;
use resound_core::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Label prepended to every echo reply.
pub const ECHO_LABEL: &str = "Receive: ";

/// Trait for processing one upgraded connection.
pub trait Handler: Send + Sync + 'static {
    /// Drive the connection until it closes.
    fn handle<'a>(
        &'a self,
        connection: Connection,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Clone into a boxed handler.
    fn clone_box(&self) -> Box<dyn Handler>;
}

impl Clone for Box<dyn Handler> {
    fn clone(&self) -> Box<dyn Handler> {
        self.clone_box()
    }
}

/// Boxed handler type.
pub type BoxedHandler = Box<dyn Handler>;

/// Echoes every message back to its sender, prefixed with [`ECHO_LABEL`].
#[derive(Debug, Clone, Default)]
pub struct EchoHandler;

impl EchoHandler {
    /// Create a new echo handler.
    pub fn new() -> Self {
        Self
    }
}

impl Handler for EchoHandler {
    fn handle<'a>(
        &'a self,
        mut conn: Connection,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            while let Some(msg) = conn.next().await? {
                match msg {
                    Message::Text(text) => {
                        conn.send_text(format!("{ECHO_LABEL}{text}")).await?;
                    }
                    Message::Binary(data) => {
                        let mut reply = BytesMut::with_capacity(ECHO_LABEL.len() + data.len());
                        reply.put_slice(ECHO_LABEL.as_bytes());
                        reply.put_slice(&data);
                        conn.send(&Message::Binary(reply.freeze())).await?;
                    }
                    Message::Close { code, reason } => {
                        debug!(peer = %conn.peer_addr(), code = ?code, "peer sent close");
                        conn.close(code, reason.as_deref()).await?;
                        break;
                    }
                    // Pings and pongs are consumed inside Connection::next
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Ok(())
        })
    }

    fn clone_box(&self) -> Box<dyn Handler> {
        Box::new(self.clone())
    }
}

/// Function-based handler, mainly for tests.
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Connection) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    fn handle<'a>(
        &'a self,
        connection: Connection,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        (self.f)(connection)
    }

    fn clone_box(&self) -> Box<dyn Handler> {
        Box::new(self.clone())
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wrap a closure as a handler.
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Connection) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync
        + Clone
        + 'static,
{
    FnHandler { f }
}
