//! # resound-core
//!
//! Protocol layer for the resound WebSocket echo endpoint:
//!
//! - Error taxonomy separating fatal startup errors from per-connection ones
//! - RFC 6455 frame parsing and serialization
//! - Upgrade handshake validation and response rendering
//! - Message assembly from frames
//! - Transport stream abstraction

#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod protocol;
pub mod transport;

pub use error::{CloseCode, ConfigError, Error, FrameError, HandshakeError, Result};
pub use frame::Frame;
pub use handshake::UpgradeRequest;
pub use message::Message;
pub use protocol::Opcode;
pub use transport::TransportStream;
