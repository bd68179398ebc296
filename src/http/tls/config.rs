//! TLS configuration
//!
//! This module provides the client TLS configuration builder. A built
//! `TlsConfig` is immutable and shared by every connection of an invocation.

use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};
use std::net::TcpStream;
use std::path::Path;
use std::str::FromStr;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl FromStr for TlsVersion {
    type Err = TlsError;

    /// Parse TLS version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "1.0" | "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "1.1" | "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "1.2" | "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "1.3" | "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Shutdown failed: {0}")]
    Shutdown(String),
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) connector: SslConnector,
    pub(crate) verify_peer: bool,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new()
    }

    /// Perform the client handshake over `stream`
    ///
    /// `servername` is sent as SNI and, when peer verification is on,
    /// checked against the certificate.
    pub fn connect(&self, stream: TcpStream, servername: &str) -> Result<super::TlsSession, TlsError> {
        super::session::TlsSession::connect(stream, self, servername)
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    builder: SslConnectorBuilder,
    verify_peer: bool,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        // Verifies against the system trust store by default
        let builder = SslConnector::builder(SslMethod::tls_client())?;

        Ok(ClientConfigBuilder {
            builder,
            verify_peer: true,
        })
    }

    /// Set TLS version range; `None` leaves that bound at the library default
    pub fn version_range(
        mut self,
        min: Option<TlsVersion>,
        max: Option<TlsVersion>,
    ) -> Result<Self, TlsError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(TlsError::InvalidVersion(format!(
                    "{} is above maximum {}",
                    min.as_str(),
                    max.as_str()
                )));
            }
        }
        self.builder
            .set_min_proto_version(min.map(|v| v.to_openssl_version()))?;
        self.builder
            .set_max_proto_version(max.map(|v| v.to_openssl_version()))?;
        Ok(self)
    }

    /// Set cipher list (for TLS <= 1.2)
    pub fn cipher_list(mut self, ciphers: &str) -> Result<Self, TlsError> {
        self.builder.set_cipher_list(ciphers)?;
        Ok(self)
    }

    /// Set ALPN protocols
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        // Encode ALPN protocols (length-prefixed)
        let mut alpn_bytes = Vec::new();
        for proto in protocols {
            alpn_bytes.push(proto.len() as u8);
            alpn_bytes.extend_from_slice(proto.as_bytes());
        }
        self.builder.set_alpn_protos(&alpn_bytes)?;
        Ok(self)
    }

    /// Enable/disable peer certificate and hostname verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        if verify {
            self.builder.set_verify(SslVerifyMode::PEER);
        } else {
            self.builder.set_verify(SslVerifyMode::NONE);
        }
        self
    }

    /// Trust the PEM certificates in `path`
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let path = path.as_ref();
        self.builder.set_ca_file(path).map_err(|e| {
            TlsError::Certificate(format!("Failed to load CA file {}: {}", path.display(), e))
        })?;
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> TlsConfig {
        TlsConfig {
            connector: self.builder.build(),
            verify_peer: self.verify_peer,
        }
    }
}
