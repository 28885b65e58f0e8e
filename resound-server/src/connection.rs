//! Per-connection WebSocket session
//!
//! Each accepted connection is owned by exactly one task, which drives
//! this type for the connection's entire lifetime. The session walks
//! `AwaitingRequest → Upgraded → Echoing → Closed`, with `Closed`
//! reachable from any state on error or peer close.

use bytes::BytesMut;
use resound_core::error::{Error, FrameError, Result};
use resound_core::frame::Frame;
use resound_core::message::Message;
use resound_core::protocol::Opcode;
use resound_core::transport::TransportStream;
use std::net::SocketAddr;
use tracing::trace;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Reading the initial HTTP request head
    AwaitingRequest,
    /// Handshake complete, no message exchanged yet
    Upgraded,
    /// Echo loop running
    Echoing,
    /// Terminal: peer closed or an error tore the session down
    Closed,
}

/// An upgraded WebSocket connection.
pub struct Connection {
    stream: Box<dyn TransportStream>,
    peer_addr: SocketAddr,
    state: SessionState,
    read_buf: BytesMut,
    max_frame_size: usize,
    // Opcode and accumulated payload of an unfinished fragmented message
    fragment: Option<(Opcode, Vec<u8>)>,
}

impl Connection {
    /// Wrap a stream whose upgrade handshake already completed.
    pub fn new(stream: Box<dyn TransportStream>, peer_addr: SocketAddr, max_frame_size: usize) -> Self {
        Self {
            stream,
            peer_addr,
            state: SessionState::Upgraded,
            read_buf: BytesMut::with_capacity(4096),
            max_frame_size,
            fragment: None,
        }
    }

    /// Address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Seed the read buffer with bytes that arrived alongside the
    /// request head.
    pub fn feed(&mut self, data: &[u8]) {
        self.read_buf.extend_from_slice(data);
    }

    /// Receive the next complete data or close message.
    ///
    /// Pings are answered inline and pongs swallowed; neither surfaces
    /// to the caller. Returns `Ok(None)` once the peer has closed the
    /// transport. A protocol violation sends the peer the matching
    /// close code before the error is returned.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        if self.state == SessionState::Closed {
            return Ok(None);
        }
        self.state = SessionState::Echoing;

        match self.next_message().await {
            Err(Error::Frame(violation)) => {
                self.state = SessionState::Closed;
                // Best effort; the peer may already be gone
                let code = violation.close_code().as_u16();
                let _ = self.write_frame(&Frame::close(Some(code), None)).await;
                let _ = self.stream.close().await;
                Err(violation.into())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                Err(e)
            }
            ok => ok,
        }
    }

    async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            while let Some(frame) = Frame::parse(&mut self.read_buf, self.max_frame_size)? {
                // RFC 6455 section 5.1: every client frame must be masked
                if !frame.is_masked() {
                    return Err(FrameError::UnmaskedClientFrame.into());
                }

                match frame.opcode {
                    Opcode::Ping => {
                        trace!(peer = %self.peer_addr, "ping, answering with pong");
                        self.write_frame(&Frame::pong(frame.payload)).await?;
                    }
                    Opcode::Pong => {}
                    Opcode::Close => {
                        self.state = SessionState::Closed;
                        return Ok(Some(Message::from_close_frame(&frame)));
                    }
                    Opcode::Text | Opcode::Binary => {
                        if self.fragment.is_some() {
                            return Err(FrameError::InvalidContinuation.into());
                        }
                        if frame.fin {
                            return Message::from_data(frame.opcode, frame.payload.to_vec())
                                .map(Some);
                        }
                        self.fragment = Some((frame.opcode, frame.payload.to_vec()));
                    }
                    Opcode::Continuation => {
                        let (opcode, mut payload) = match self.fragment.take() {
                            Some(pending) => pending,
                            None => return Err(FrameError::InvalidContinuation.into()),
                        };
                        if payload.len() + frame.payload.len() > self.max_frame_size {
                            return Err(FrameError::TooLarge {
                                size: payload.len() + frame.payload.len(),
                                max: self.max_frame_size,
                            }
                            .into());
                        }
                        payload.extend_from_slice(&frame.payload);
                        if frame.fin {
                            return Message::from_data(opcode, payload).map(Some);
                        }
                        self.fragment = Some((opcode, payload));
                    }
                }
            }

            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                self.state = SessionState::Closed;
                return Ok(None);
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Send one message as a single frame.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.write_frame(&message.to_frame()).await
    }

    /// Send a text message.
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.send(&Message::Text(text.into())).await
    }

    /// Reply to the peer's close frame and shut the transport down.
    pub async fn close(&mut self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        // Best effort: the peer may already be gone
        let _ = self.write_frame(&Frame::close(code, reason)).await;
        let _ = self.stream.close().await;
        self.state = SessionState::Closed;
        Ok(())
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.to_bytes();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state)
            .finish()
    }
}
