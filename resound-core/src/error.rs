//! Error types for resound
//!
//! Startup errors (`Config`, `Bind`) abort the process; everything else
//! is scoped to a single connection and must never take the listener down.

use std::fmt;
use thiserror::Error;

/// Result type alias for resound operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// TLS material is unreadable or malformed. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listen port could not be bound. Fatal at startup.
    #[error("bind error: {0}")]
    Bind(#[source] std::io::Error),

    /// The upgrade negotiation failed. Reject and close that connection.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// The peer violated the framing protocol. Close that connection.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Mid-session I/O failure. Close that connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort process startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Bind(_))
    }
}

/// TLS configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The certificate file could not be read or contained no certificates
    #[error("certificate file {path}: {reason}")]
    Certificate { path: String, reason: String },

    /// The private key file could not be read or contained no usable key
    #[error("private key file {path}: {reason}")]
    PrivateKey { path: String, reason: String },

    /// rustls rejected the certificate/key pair
    #[error("invalid TLS certificate/key: {0}")]
    Tls(String),

    /// A configuration value failed validation
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// WebSocket upgrade negotiation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The request head could not be parsed as HTTP
    #[error("malformed HTTP request: {0}")]
    MalformedRequest(String),

    /// A required upgrade header is absent
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// A header carried an unacceptable value
    #[error("invalid value for {header}: {value}")]
    InvalidHeader { header: &'static str, value: String },

    /// The client asked for a WebSocket version other than 13
    #[error("unsupported WebSocket version: {0}")]
    UnsupportedVersion(String),

    /// Sec-WebSocket-Key was not 16 base64-encoded bytes
    #[error("invalid Sec-WebSocket-Key: {0}")]
    InvalidKey(String),

    /// Upgrade requests must use GET
    #[error("upgrade request used method {0}, expected GET")]
    InvalidMethod(String),

    /// The request head exceeded the size cap before the blank line
    #[error("request head exceeds {max} bytes")]
    RequestTooLarge { max: usize },

    /// The peer went silent before finishing the request head
    #[error("handshake timed out")]
    Timeout,
}

/// Frame-level protocol violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The opcode nibble is not one defined by RFC 6455
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// A client data frame arrived without a masking key
    #[error("unmasked frame from client")]
    UnmaskedClientFrame,

    /// Control frames must fit in a single frame
    #[error("fragmented control frame")]
    FragmentedControlFrame,

    /// RSV bits are reserved for extensions, which are not negotiated
    #[error("reserved bits set in frame")]
    ReservedBitsSet,

    /// A continuation frame arrived with no message in progress,
    /// or a new data frame interrupted an unfinished message
    #[error("unexpected continuation state")]
    InvalidContinuation,

    /// Frame payload exceeds the configured limit
    #[error("frame too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// A text message did not decode as UTF-8
    #[error("invalid UTF-8 in text message")]
    InvalidUtf8,
}

impl FrameError {
    /// Close code to send the peer for this violation.
    pub fn close_code(&self) -> CloseCode {
        match self {
            FrameError::TooLarge { .. } => CloseCode::TooBig,
            FrameError::InvalidUtf8 => CloseCode::InvalidPayload,
            _ => CloseCode::ProtocolError,
        }
    }
}

/// WebSocket close codes from RFC 6455 section 7.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Endpoint going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unacceptable data type
    Unsupported,
    /// Invalid payload data
    InvalidPayload,
    /// Message too big
    TooBig,
    /// Internal server error
    Internal,
    /// Any other code on the wire
    Other(u16),
}

impl CloseCode {
    /// Map a wire value to a close code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1007 => CloseCode::InvalidPayload,
            1009 => CloseCode::TooBig,
            1011 => CloseCode::Internal,
            other => CloseCode::Other(other),
        }
    }

    /// Wire value of this close code.
    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::TooBig => 1009,
            CloseCode::Internal => 1011,
            CloseCode::Other(code) => *code,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_to_close_codes() {
        assert_eq!(
            FrameError::UnmaskedClientFrame.close_code(),
            CloseCode::ProtocolError
        );
        assert_eq!(
            FrameError::TooLarge { size: 2, max: 1 }.close_code(),
            CloseCode::TooBig
        );
        assert_eq!(
            FrameError::InvalidUtf8.close_code(),
            CloseCode::InvalidPayload
        );
    }

    #[test]
    fn close_code_round_trip() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1002).as_u16(), 1002);
        assert_eq!(CloseCode::from_u16(4000), CloseCode::Other(4000));
    }

    #[test]
    fn startup_errors_are_fatal() {
        let err = Error::Config(ConfigError::Validation("bad".into()));
        assert!(err.is_fatal());

        let err = Error::Handshake(HandshakeError::Timeout);
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_display_includes_context() {
        let err = Error::Handshake(HandshakeError::MissingHeader("sec-websocket-key"));
        assert!(err.to_string().contains("sec-websocket-key"));

        let err = Error::Frame(FrameError::TooLarge { size: 10, max: 5 });
        assert!(err.to_string().contains("10"));
    }
}
