//! WebSocket upgrade negotiation (RFC 6455 section 4)
//!
//! Parses the initial HTTP request head, decides whether it asks for an
//! upgrade, validates the required headers, and renders the three
//! responses this server ever sends before framing starts: `101
//! Switching Protocols`, a bodyless `200 OK` for plain HTTP, and `400
//! Bad Request` for broken upgrade attempts.

use crate::error::{HandshakeError, Result};
use crate::protocol::handshake::*;
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// A parsed HTTP request head.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    /// HTTP method
    pub method: String,
    /// Request target path
    pub path: String,
    /// Headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl UpgradeRequest {
    /// Parse a complete request head (through the terminating blank line).
    pub fn parse(head: &[u8]) -> Result<Self> {
        let mut header_buf = [httparse::EMPTY_HEADER; 64];
        let mut req = httparse::Request::new(&mut header_buf);

        let status = req
            .parse(head)
            .map_err(|e| HandshakeError::MalformedRequest(e.to_string()))?;
        if status.is_partial() {
            return Err(HandshakeError::MalformedRequest("truncated request head".into()).into());
        }

        let method = req
            .method
            .ok_or_else(|| HandshakeError::MalformedRequest("missing method".into()))?
            .to_string();
        let path = req
            .path
            .ok_or_else(|| HandshakeError::MalformedRequest("missing path".into()))?
            .to_string();

        let mut headers = HashMap::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            let value = std::str::from_utf8(header.value)
                .map_err(|_| HandshakeError::MalformedRequest("non-UTF-8 header value".into()))?;
            headers.insert(header.name.to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Self {
            method,
            path,
            headers,
        })
    }

    /// Look up a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether the request expresses WebSocket upgrade intent.
    ///
    /// Intent alone does not make the request valid; see [`validate`].
    ///
    /// [`validate`]: UpgradeRequest::validate
    pub fn wants_upgrade(&self) -> bool {
        let upgrade = self
            .header(HEADER_UPGRADE)
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        let connection = self
            .header(HEADER_CONNECTION)
            .map(|v| {
                v.split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
            })
            .unwrap_or(false);
        upgrade && connection
    }

    /// Validate the upgrade headers and return the client key.
    pub fn validate(&self) -> Result<&str> {
        if self.method != "GET" {
            return Err(HandshakeError::InvalidMethod(self.method.clone()).into());
        }

        let upgrade = self
            .header(HEADER_UPGRADE)
            .ok_or(HandshakeError::MissingHeader(HEADER_UPGRADE))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(HandshakeError::InvalidHeader {
                header: HEADER_UPGRADE,
                value: upgrade.to_string(),
            }
            .into());
        }

        let connection = self
            .header(HEADER_CONNECTION)
            .ok_or(HandshakeError::MissingHeader(HEADER_CONNECTION))?;
        if !connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        {
            return Err(HandshakeError::InvalidHeader {
                header: HEADER_CONNECTION,
                value: connection.to_string(),
            }
            .into());
        }

        let version = self
            .header(HEADER_SEC_WEBSOCKET_VERSION)
            .ok_or(HandshakeError::MissingHeader(HEADER_SEC_WEBSOCKET_VERSION))?;
        if version != WEBSOCKET_VERSION {
            return Err(HandshakeError::UnsupportedVersion(version.to_string()).into());
        }

        let key = self
            .header(HEADER_SEC_WEBSOCKET_KEY)
            .ok_or(HandshakeError::MissingHeader(HEADER_SEC_WEBSOCKET_KEY))?;
        if !valid_key(key) {
            return Err(HandshakeError::InvalidKey(key.to_string()).into());
        }

        Ok(key)
    }
}

/// A Sec-WebSocket-Key must decode to exactly 16 bytes.
fn valid_key(key: &str) -> bool {
    general_purpose::STANDARD
        .decode(key)
        .map(|bytes| bytes.len() == 16)
        .unwrap_or(false)
}

/// Compute the Sec-WebSocket-Accept value for a client key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

/// Render the 101 response completing the upgrade.
pub fn switching_protocols(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
}

/// Render the bodyless 200 sent to every non-upgrade request.
pub fn plain_ok() -> &'static str {
    "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"
}

/// Render the rejection for a malformed upgrade attempt.
pub fn bad_request() -> &'static str {
    "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SAMPLE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: localhost:3000\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn parses_upgrade_request() {
        let req = UpgradeRequest::parse(SAMPLE_REQUEST).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/");
        assert!(req.wants_upgrade());
        assert_eq!(req.validate().unwrap(), "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn rfc_sample_accept_key() {
        // Known vector from RFC 6455 section 1.3
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn plain_request_has_no_upgrade_intent() {
        let head = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        assert!(!req.wants_upgrade());
    }

    #[test]
    fn keep_alive_upgrade_connection_header() {
        let head = b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: keep-alive, Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        assert!(req.wants_upgrade());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_key_rejected() {
        let head = b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        let err = req.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::MissingHeader("sec-websocket-key"))
        ));
    }

    #[test]
    fn wrong_version_rejected() {
        let head = b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 8\r\n\
            \r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        assert!(matches!(
            req.validate().unwrap_err(),
            Error::Handshake(HandshakeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn post_upgrade_rejected() {
        let head = b"POST / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        assert!(matches!(
            req.validate().unwrap_err(),
            Error::Handshake(HandshakeError::InvalidMethod(_))
        ));
    }

    #[test]
    fn garbage_key_rejected() {
        let head = b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: not-base64!!\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        let req = UpgradeRequest::parse(head).unwrap();
        assert!(matches!(
            req.validate().unwrap_err(),
            Error::Handshake(HandshakeError::InvalidKey(_))
        ));
    }

    #[test]
    fn response_rendering() {
        let resp = switching_protocols("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert!(resp.starts_with("HTTP/1.1 101"));
        assert!(resp.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(resp.ends_with("\r\n\r\n"));

        assert!(plain_ok().contains("Content-Length: 0"));
        assert!(bad_request().starts_with("HTTP/1.1 400"));
    }
}
