//! WebSocket protocol constants from RFC 6455

/// Frame opcodes (RFC 6455 section 5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation of a fragmented message
    Continuation,
    /// Text frame
    Text,
    /// Binary frame
    Binary,
    /// Close frame
    Close,
    /// Ping frame
    Ping,
    /// Pong frame
    Pong,
}

impl Opcode {
    /// Decode an opcode nibble. Returns `None` for reserved values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Wire value of the opcode.
    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    /// Close, ping and pong are control opcodes.
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Text, binary and continuation carry message data.
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary | Opcode::Continuation)
    }
}

/// Frame header bits and markers
pub mod frame {
    /// FIN bit
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1/2/3 bits, reserved for extensions
    pub const RSV_MASK: u8 = 0x70;

    /// Opcode nibble
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit in the second header byte
    pub const MASK_BIT: u8 = 0x80;

    /// 7-bit payload length field
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Marker for a 16-bit extended length
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Marker for a 64-bit extended length
    pub const PAYLOAD_LEN_64: u8 = 127;
}

/// Handshake constants
pub mod handshake {
    /// GUID appended to the client key before hashing (RFC 6455 section 1.3)
    pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// The only protocol version this server speaks
    pub const WEBSOCKET_VERSION: &str = "13";

    /// Upgrade header name, lowercase
    pub const HEADER_UPGRADE: &str = "upgrade";

    /// Connection header name, lowercase
    pub const HEADER_CONNECTION: &str = "connection";

    /// Sec-WebSocket-Key header name, lowercase
    pub const HEADER_SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

    /// Sec-WebSocket-Version header name, lowercase
    pub const HEADER_SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";

    /// Sec-WebSocket-Accept header name, lowercase
    pub const HEADER_SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";

    /// Cap on the request head, matching common HTTP server defaults
    pub const MAX_REQUEST_HEAD: usize = 8192;
}

/// Default limits
pub mod limits {
    /// Default maximum frame payload size
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: std::time::Duration =
        std::time::Duration::from_secs(10);
}
