//! TLS support for HTTP connections
//!
//! This module layers OpenSSL client sessions under the HTTP client so that
//! `https` URLs use the same request/response code as plain connections.
//!
//! # Architecture
//!
//! 1. `TlsConfig` defines TLS settings (versions, trust anchors, ALPN, verification)
//! 2. `TlsSession` implements the `SessionOps` trait for encrypted I/O
//! 3. All HTTP code remains unchanged - it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use vcurl::http::tls::{TlsConfig, TlsVersion};
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .unwrap()
//!     .version_range(Some(TlsVersion::Tls12), None)
//!     .unwrap()
//!     .alpn(&["http/1.1"])
//!     .unwrap()
//!     .build();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream, "example.com").unwrap();
//! ```

pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, TlsConfig, TlsError, TlsVersion};
pub use session::TlsSession;
