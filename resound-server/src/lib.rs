//! # resound-server
//!
//! TLS-terminated WebSocket echo server.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use resound_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> resound_core::Result<()> {
//!     let server = Server::builder()
//!         .bind("0.0.0.0:3000".parse().unwrap())
//!         .tls("server.crt", "server.key")
//!         .build()?;
//!
//!     server.serve().await
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;
pub mod logging;
pub mod server;

pub use config::ServerConfig;
pub use connection::{Connection, SessionState};
pub use handler::{BoxedHandler, EchoHandler, Handler, ECHO_LABEL};
pub use listener::{TlsListener, TlsSession};
pub use server::{Server, ServerBuilder};
