//! Session operations abstraction
//!
//! This module provides the session operations pattern that allows
//! transparent switching between plain TCP and TLS connections.
//!
//! `Transport` is the closed set of session variants a connection can use;
//! `HttpSession` layers per-operation timeouts, an overall deadline and
//! optional per-direction rate limits on top of any of them.

use super::tls::TlsSession;
use super::{Error, Result, Throttle};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over plain TCP and TLS connections.
pub trait SessionOps {
    /// Poll the session for events
    ///
    /// Returns true if the session is ready for the requested operation
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Bound blocking socket calls (used while shutting down)
    fn set_io_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Close the session
    ///
    /// TLS sessions run the close handshake; plain sessions close the
    /// socket and report success.
    fn shutdown(&mut self) -> Result<()>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// Wait for `events` on a raw descriptor
pub(crate) fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(Error::Io(err));
    }

    Ok(result > 0)
}

/// Plain TCP session operations
#[derive(Debug)]
pub struct PlainSession {
    stream: TcpStream,
}

impl PlainSession {
    /// Create a new plain session from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        PlainSession { stream }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl SessionOps for PlainSession {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(Error::Io(e)),
            _ => Ok(()),
        }
    }
}

/// A connection's transport, plain or TLS
#[derive(Debug)]
pub enum Transport {
    Plain(PlainSession),
    Tls(Box<TlsSession>),
}

impl Transport {
    /// Check whether the transport is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }
}

impl SessionOps for Transport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        match self {
            Transport::Plain(s) => s.poll(events, timeout),
            Transport::Tls(s) => s.poll(events, timeout),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::Tls(s) => s.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::Tls(s) => s.flush(),
        }
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match self {
            Transport::Plain(s) => s.set_io_timeout(timeout),
            Transport::Tls(s) => s.set_io_timeout(timeout),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Plain(s) => s.shutdown(),
            Transport::Tls(s) => s.shutdown(),
        }
    }
}

/// HTTP session wrapping a transport with session operations
pub struct HttpSession<S: SessionOps> {
    session: S,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    read_limit: Option<Throttle>,
    write_limit: Option<Throttle>,
    closed: bool,
}

impl<S: SessionOps> HttpSession<S> {
    /// Create a new HTTP session
    pub fn new(session: S) -> Self {
        HttpSession {
            session,
            timeout: None,
            deadline: None,
            read_limit: None,
            write_limit: None,
            closed: false,
        }
    }

    /// Set the timeout for a single read or write
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Set an absolute deadline for every remaining operation
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Limit received bytes per second
    pub fn set_read_limit(&mut self, bytes_per_second: Option<u64>) {
        self.read_limit = bytes_per_second.map(Throttle::new);
    }

    /// Limit sent bytes per second
    pub fn set_write_limit(&mut self, bytes_per_second: Option<u64>) {
        self.write_limit = bytes_per_second.map(Throttle::new);
    }

    /// The wait allowed for the next poll
    fn wait(&self) -> Result<Option<Duration>> {
        let remaining = match self.deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout);
                }
                Some(deadline - now)
            }
            None => None,
        };

        Ok(match (self.timeout, remaining) {
            (Some(t), Some(r)) => Some(t.min(r)),
            (t, r) => t.or(r),
        })
    }

    /// Read data with timeout
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Read, self.wait()?)? {
            return Err(Error::Timeout);
        }

        let len = match &self.read_limit {
            Some(limit) => buf.len().min(limit.max_chunk()),
            None => buf.len(),
        };
        let n = self.session.read(&mut buf[..len])?;

        if let Some(limit) = self.read_limit.as_mut() {
            limit.consume(n);
        }
        Ok(n)
    }

    /// Write data with timeout
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.session.poll(PollEvents::Write, self.wait()?)? {
            return Err(Error::Timeout);
        }

        let len = match &self.write_limit {
            Some(limit) => buf.len().min(limit.max_chunk()),
            None => buf.len(),
        };
        let n = self.session.write(&buf[..len])?;

        if let Some(limit) = self.write_limit.as_mut() {
            limit.consume(n);
        }
        Ok(n)
    }

    /// Write the whole buffer
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> Result<()> {
        self.session.flush()
    }

    /// Shut the session down, waiting at most `grace` for the peer
    ///
    /// Only the first call acts; later calls succeed without touching the
    /// transport.
    pub fn shutdown(&mut self, grace: Duration) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.session.set_io_timeout(Some(grace))?;
        self.session.shutdown()
    }

    /// Check whether shutdown has been attempted
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get a reference to the underlying session
    pub fn get_ref(&self) -> &S {
        &self.session
    }
}
