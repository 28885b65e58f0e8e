//! Complete WebSocket messages, assembled from one or more frames.

use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::protocol::Opcode;
use bytes::Bytes;
use std::fmt;

/// One complete message received from or destined for the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Binary(Bytes),
    /// Ping with its payload
    Ping(Bytes),
    /// Pong with its payload
    Pong(Bytes),
    /// Close with optional code and reason
    Close {
        /// Close code from the wire, if the payload carried one
        code: Option<u16>,
        /// Close reason, if present
        reason: Option<String>,
    },
}

impl Message {
    /// Text message.
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// Binary message.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Message::Binary(data.into())
    }

    /// Assemble a data message from reassembled fragment payload bytes.
    pub fn from_data(opcode: Opcode, payload: Vec<u8>) -> Result<Self> {
        match opcode {
            Opcode::Text => {
                let text = String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
                Ok(Message::Text(text))
            }
            Opcode::Binary => Ok(Message::Binary(Bytes::from(payload))),
            other => Err(FrameError::InvalidOpcode(other.as_u8()).into()),
        }
    }

    /// Build the close message carried by a close frame.
    pub fn from_close_frame(frame: &Frame) -> Self {
        Message::Close {
            code: frame.close_code(),
            reason: frame.close_reason(),
        }
    }

    /// Serialize this message as a single outgoing frame.
    pub fn to_frame(&self) -> Frame {
        match self {
            Message::Text(text) => Frame::text(text.clone().into_bytes()),
            Message::Binary(data) => Frame::binary(data.clone()),
            Message::Ping(data) => Frame::ping(data.clone()),
            Message::Pong(data) => Frame::pong(data.clone()),
            Message::Close { code, reason } => Frame::close(*code, reason.as_deref()),
        }
    }

    /// Whether this is a data (text or binary) message.
    pub fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Text content, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Message::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
            Message::Ping(data) => write!(f, "Ping({} bytes)", data.len()),
            Message::Pong(data) => write!(f, "Pong({} bytes)", data.len()),
            Message::Close { code, .. } => write!(f, "Close({code:?})"),
        }
    }
}
