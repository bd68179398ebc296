//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use super::config::{TlsConfig, TlsError};
use crate::http::session::{poll_fd, PollEvents, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::{ErrorCode, ShutdownResult, SslStream};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS session operations
///
/// Implements SessionOps trait for TLS-encrypted connections.
/// Wraps an OpenSSL SslStream and provides poll/read/write/shutdown operations.
#[derive(Debug)]
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSession {
    /// Create a client TLS connection (perform handshake)
    pub fn connect(
        tcp_stream: TcpStream,
        config: &TlsConfig,
        servername: &str,
    ) -> std::result::Result<Self, TlsError> {
        // Sets SNI for host names and hostname verification when enabled
        let ssl = config
            .connector
            .configure()?
            .verify_hostname(config.verify_peer)
            .into_ssl(servername)?;

        let stream = ssl
            .connect(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("{}: {}", servername, e)))?;

        tracing::debug!(
            version = stream.ssl().version_str(),
            alpn = ?stream.ssl().selected_alpn_protocol().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );

        Ok(TlsSession {
            stream,
            failed: false,
        })
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Receive the peer's close_notify after ours was sent
    fn finish_shutdown(&mut self) -> HttpResult<()> {
        match self.stream.shutdown() {
            Ok(ShutdownResult::Sent) | Ok(ShutdownResult::Received) => Ok(()),
            Err(e) => Err(classify_shutdown_error(e)),
        }
    }
}

fn classify_shutdown_error(e: openssl::ssl::Error) -> Error {
    if e.code() == ErrorCode::ZERO_RETURN {
        return Error::ConnectionClosed;
    }
    match e.io_error() {
        // EOF without close_notify
        None if e.code() == ErrorCode::SYSCALL => Error::Truncated,
        Some(io) => match io.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => Error::Truncated,
            _ => Error::Tls(TlsError::Shutdown(e.to_string())),
        },
        None => Error::Tls(TlsError::Shutdown(e.to_string())),
    }
}

impl SessionOps for TlsSession {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> HttpResult<bool> {
        // Check if SSL has pending data
        if events != PollEvents::Write && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn flush(&mut self) -> HttpResult<()> {
        self.stream.flush().map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> HttpResult<()> {
        let tcp = self.stream.get_ref();
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)?;
        Ok(())
    }

    fn shutdown(&mut self) -> HttpResult<()> {
        // A failed session has no usable TLS state left to close
        let result = if self.failed {
            Ok(())
        } else {
            match self.stream.shutdown() {
                Ok(ShutdownResult::Sent) => self.finish_shutdown(),
                Ok(ShutdownResult::Received) => Ok(()),
                Err(e) => Err(classify_shutdown_error(e)),
            }
        };

        // The peer may already be gone
        let _ = self.stream.get_mut().shutdown(Shutdown::Both);

        match result {
            Err(Error::ConnectionClosed) => Ok(()),
            other => other,
        }
    }
}
