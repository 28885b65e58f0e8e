//! Server configuration and TLS material loading
//!
//! The configuration is built once at startup and never mutated; tasks
//! receive clones of it.

use resound_core::error::{ConfigError, Error, Result};
use resound_core::protocol::limits;
use rustls::{Certificate, PrivateKey, ServerConfig as RustlsServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TLS listener binds
    pub bind_address: SocketAddr,
    /// Path to the PEM certificate chain
    pub cert_file: PathBuf,
    /// Path to the PEM private key
    pub key_file: PathBuf,
    /// Request path that upgrades to a WebSocket session
    pub upgrade_path: String,
    /// How long a client may take to send its request head
    pub handshake_timeout: Duration,
    /// Maximum accepted frame payload size
    pub max_frame_size: usize,
}

impl ServerConfig {
    /// Configuration with the original deployment's defaults:
    /// port 3000, upgrade path `/`.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: "0.0.0.0:3000".parse().expect("static address"),
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            upgrade_path: "/".to_string(),
            handshake_timeout: limits::DEFAULT_HANDSHAKE_TIMEOUT,
            max_frame_size: limits::DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "max_frame_size must be greater than 0".to_string(),
            )));
        }
        if !self.upgrade_path.starts_with('/') {
            return Err(Error::Config(ConfigError::Validation(format!(
                "upgrade_path must start with '/': {}",
                self.upgrade_path
            ))));
        }
        Ok(())
    }
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let file = File::open(path).map_err(|e| {
        Error::Config(ConfigError::Certificate {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    let mut reader = BufReader::new(file);
    let cert_vec = certs(&mut reader).map_err(|e| {
        Error::Config(ConfigError::Certificate {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    if cert_vec.is_empty() {
        return Err(Error::Config(ConfigError::Certificate {
            path: path.display().to_string(),
            reason: "no certificates found".to_string(),
        }));
    }
    Ok(cert_vec.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let open = |path: &Path| -> Result<BufReader<File>> {
        let file = File::open(path).map_err(|e| {
            Error::Config(ConfigError::PrivateKey {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        Ok(BufReader::new(file))
    };

    // PKCS#8 first, then the PKCS#1 RSA fallback
    let mut reader = open(path)?;
    if let Ok(keys) = pkcs8_private_keys(&mut reader) {
        if let Some(key) = keys.into_iter().next() {
            return Ok(PrivateKey(key));
        }
    }

    let mut reader = open(path)?;
    let keys = rsa_private_keys(&mut reader).map_err(|e| {
        Error::Config(ConfigError::PrivateKey {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;

    keys.into_iter().next().map(PrivateKey).ok_or_else(|| {
        Error::Config(ConfigError::PrivateKey {
            path: path.display().to_string(),
            reason: "no private keys found".to_string(),
        })
    })
}

/// Load the configured TLS material into a rustls server config.
pub fn build_rustls_server_config(config: &ServerConfig) -> Result<RustlsServerConfig> {
    let certs = load_certs(&config.cert_file)?;
    let key = load_private_key(&config.key_file)?;

    RustlsServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Config(ConfigError::Tls(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let config = ServerConfig::new("server.crt", "server.key");
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.upgrade_path, "/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_frame_size_rejected() {
        let mut config = ServerConfig::new("server.crt", "server.key");
        config.max_frame_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_upgrade_path_rejected() {
        let mut config = ServerConfig::new("server.crt", "server.key");
        config.upgrade_path = "echo".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_cert_file_is_config_error() {
        let config = ServerConfig::new("/nonexistent/server.crt", "/nonexistent/server.key");
        let err = build_rustls_server_config(&config).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            Error::Config(ConfigError::Certificate { .. })
        ));
    }
}
