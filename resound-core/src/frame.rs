//! RFC 6455 frame parsing and serialization
//!
//! The parser is incremental: `Frame::parse` returns `Ok(None)` until a
//! complete frame is buffered, so callers can keep appending bytes from
//! the transport without tracking partial-frame state themselves.

use crate::error::{FrameError, Result};
use crate::protocol::{frame::*, Opcode};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One WebSocket frame.
///
/// The payload is always stored unmasked; `mask` records the masking key
/// a parsed client frame arrived with, or the key to apply when
/// serializing a client-role frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Final frame of a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Masking key, present on client frames
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a final, unmasked frame.
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Text frame.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Binary frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Ping frame.
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Pong frame.
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Close frame with an optional code and reason.
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let mut payload = BytesMut::new();
        if let Some(code) = code {
            payload.put_u16(code);
            if let Some(reason) = reason {
                payload.put_slice(reason.as_bytes());
            }
        }
        Self::new(Opcode::Close, payload.freeze())
    }

    /// Clear the FIN bit, marking this as a non-final fragment.
    pub fn fragment(mut self) -> Self {
        self.fin = false;
        self
    }

    /// Attach a random masking key, as a client must before sending.
    pub fn masked(mut self) -> Self {
        self.mask = Some(rand::random::<[u8; 4]>());
        self
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 14);
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Serialize onto the end of `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(((self.fin as u8) << 7) | self.opcode.as_u8());

        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };
        let len = self.payload.len();
        if len < PAYLOAD_LEN_16 as usize {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(len as u64);
        }

        match self.mask {
            Some(key) => {
                buf.put_slice(&key);
                buf.put_slice(&apply_mask(&self.payload, &key));
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Try to parse one frame from the front of `buf`.
    ///
    /// Consumes the frame's bytes on success; leaves `buf` untouched and
    /// returns `Ok(None)` when the frame is not yet complete. Frames
    /// whose payload exceeds `max_frame_size` are rejected before the
    /// payload is buffered in full.
    pub fn parse(buf: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let first = buf[0];
        let second = buf[1];

        if first & RSV_MASK != 0 {
            return Err(FrameError::ReservedBitsSet.into());
        }

        let fin = first & FIN_BIT != 0;
        let opcode = Opcode::from_u8(first & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first & OPCODE_MASK))?;

        if opcode.is_control() && !fin {
            return Err(FrameError::FragmentedControlFrame.into());
        }

        let masked = second & MASK_BIT != 0;
        let len_field = second & PAYLOAD_LEN_MASK;

        let (payload_len, header_len) = match len_field {
            PAYLOAD_LEN_16 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            PAYLOAD_LEN_64 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut len_bytes = [0u8; 8];
                len_bytes.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(len_bytes);
                if len > usize::MAX as u64 {
                    return Err(FrameError::TooLarge {
                        size: usize::MAX,
                        max: max_frame_size,
                    }
                    .into());
                }
                (len as usize, 10)
            }
            n => (n as usize, 2),
        };

        if payload_len > max_frame_size {
            return Err(FrameError::TooLarge {
                size: payload_len,
                max: max_frame_size,
            }
            .into());
        }

        let mask_len = if masked { 4 } else { 0 };
        let frame_len = header_len + mask_len + payload_len;
        if buf.len() < frame_len {
            return Ok(None);
        }

        buf.advance(header_len);
        let mask = if masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[..4]);
            buf.advance(4);
            Some(key)
        } else {
            None
        };

        let raw = buf.split_to(payload_len).freeze();
        let payload = match mask {
            Some(key) => apply_mask(&raw, &key),
            None => raw,
        };

        Ok(Some(Frame {
            fin,
            opcode,
            mask,
            payload,
        }))
    }

    /// Whether the frame arrived masked (client frames must).
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Close code carried by a close frame, if any.
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode == Opcode::Close && self.payload.len() >= 2 {
            Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
        } else {
            None
        }
    }

    /// Close reason carried by a close frame, lossily decoded.
    pub fn close_reason(&self) -> Option<String> {
        if self.opcode == Opcode::Close && self.payload.len() > 2 {
            Some(String::from_utf8_lossy(&self.payload[2..]).into_owned())
        } else {
            None
        }
    }
}

/// XOR the payload with the 4-byte masking key.
fn apply_mask(data: &[u8], key: &[u8; 4]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len());
    for (i, &byte) in data.iter().enumerate() {
        out.put_u8(byte ^ key[i % 4]);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const MAX: usize = 16 * 1024 * 1024;

    #[test]
    fn text_frame_serialization() {
        let bytes = Frame::text("hello").to_bytes();
        assert_eq!(bytes[0], 0x81); // FIN | text
        assert_eq!(bytes[1], 0x05);
        assert_eq!(&bytes[2..], b"hello");
    }

    #[test]
    fn masked_round_trip() {
        let bytes = Frame::text("hello").masked().to_bytes();
        assert_eq!(bytes[1] & 0x80, 0x80);
        assert_eq!(bytes.len(), 2 + 4 + 5);

        let mut buf = BytesMut::from(&bytes[..]);
        let frame = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert!(frame.is_masked());
        assert_eq!(&frame.payload[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_returns_none() {
        let bytes = Frame::text("partial").to_bytes();
        let mut buf = BytesMut::from(&bytes[..4]);
        assert!(Frame::parse(&mut buf, MAX).unwrap().is_none());
        // Nothing consumed while incomplete
        assert_eq!(buf.len(), 4);

        buf.extend_from_slice(&bytes[4..]);
        let frame = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"partial");
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::text("one").to_bytes());
        buf.extend_from_slice(&Frame::ping("pp").to_bytes());

        let first = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(first.opcode, Opcode::Text);
        let second = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(second.opcode, Opcode::Ping);
        assert!(buf.is_empty());
    }

    #[test]
    fn extended_16bit_length() {
        let payload = vec![7u8; 300];
        let bytes = Frame::binary(payload.clone()).to_bytes();
        assert_eq!(bytes[1], 126);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 300);

        let mut buf = BytesMut::from(&bytes[..]);
        let frame = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 300);
    }

    #[test]
    fn extended_64bit_length() {
        let payload = vec![0u8; 65536];
        let bytes = Frame::binary(payload).to_bytes();
        assert_eq!(bytes[1], 127);
        assert_eq!(bytes[2..10], 65536u64.to_be_bytes());
    }

    #[test]
    fn close_frame_fields() {
        let frame = Frame::close(Some(1000), Some("bye"));
        let bytes = frame.to_bytes();
        let mut buf = BytesMut::from(&bytes[..]);
        let parsed = Frame::parse(&mut buf, MAX).unwrap().unwrap();
        assert_eq!(parsed.close_code(), Some(1000));
        assert_eq!(parsed.close_reason().as_deref(), Some("bye"));
    }

    #[test]
    fn oversized_frame_rejected() {
        let bytes = Frame::binary(vec![0u8; 1024]).to_bytes();
        let mut buf = BytesMut::from(&bytes[..]);
        let err = Frame::parse(&mut buf, 512).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::TooLarge { .. })));
    }

    #[test]
    fn reserved_bits_rejected() {
        let mut bytes = BytesMut::from(&Frame::text("x").to_bytes()[..]);
        bytes[0] |= 0x40; // RSV1
        let err = Frame::parse(&mut bytes, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::ReservedBitsSet)));
    }

    #[test]
    fn fragmented_control_rejected() {
        let mut bytes = BytesMut::from(&Frame::ping("p").to_bytes()[..]);
        bytes[0] &= !0x80; // clear FIN on a control frame
        let err = Frame::parse(&mut bytes, MAX).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::FragmentedControlFrame)
        ));
    }

    #[test]
    fn invalid_opcode_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x83); // FIN | reserved opcode 0x3
        buf.put_u8(0x00);
        let err = Frame::parse(&mut buf, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::InvalidOpcode(0x3))));
    }
}
