//! Connection establishment
//!
//! Resolves and connects to the target (directly, through an HTTP CONNECT
//! tunnel or through a SOCKS5 proxy), applies socket options and performs
//! the TLS handshake for `https` URLs. Every step is bounded by the connect
//! timeout.

use crate::http::parser::parse_status_line;
use crate::http::tls::{TlsConfig, TlsError};
use crate::http::{HttpRequest, Method, PlainSession, Transport, MAX_HEAD_SIZE};
use crate::uri;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Default bound on connection establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no addresses found for {0}")]
    NoAddress(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("unsupported proxy scheme {0}")]
    UnsupportedProxy(String),

    #[error("proxy: {0}")]
    Proxy(String),

    #[error(transparent)]
    Url(#[from] uri::Error),

    #[error("TLS: {0}")]
    Tls(#[from] TlsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The peer actively refused the TCP connection
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, Error::Connect { source, .. } if source.kind() == io::ErrorKind::ConnectionRefused)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// How connections are established
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub tcp_nodelay: bool,
    pub keepalive: bool,
    /// `http://`, `socks5://` or `socks5h://` proxy
    pub proxy: Option<Url>,
    /// Sent on CONNECT requests
    pub user_agent: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tcp_nodelay: false,
            keepalive: true,
            proxy: None,
            user_agent: crate::request::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Open a transport to the origin of `url`
pub fn open(url: &Url, opts: &ConnectOptions, tls: &TlsConfig) -> Result<Transport> {
    let deadline = Instant::now() + opts.connect_timeout;
    let host = uri::connect_host(url);
    let port = uri::effective_port(url)?;

    let stream = match &opts.proxy {
        None => connect_tcp(host, port, deadline, opts)?,
        Some(proxy) => {
            let proxy_host = uri::connect_host(proxy);
            let proxy_port = uri::effective_port(proxy)?;
            let mut stream = connect_tcp(proxy_host, proxy_port, deadline, opts)?;
            set_stream_timeout(&stream, deadline, host)?;
            match proxy.scheme() {
                "http" => connect_http_proxy(&mut stream, proxy, url, &opts.user_agent)?,
                "socks5" | "socks5h" => connect_socks5_proxy(&mut stream, proxy, host, port)?,
                other => return Err(Error::UnsupportedProxy(other.to_string())),
            }
            debug!("Tunnel to {}:{} established via {}", host, port, proxy_host);
            stream
        }
    };

    if url.scheme() != "https" {
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;
        return Ok(Transport::Plain(PlainSession::new(stream)));
    }

    set_stream_timeout(&stream, deadline, host)?;
    let session = tls.connect(stream, host).map_err(|e| match e {
        TlsError::HandshakeFailed(_) if Instant::now() >= deadline => Error::Timeout(host.to_string()),
        e => Error::Tls(e),
    })?;
    session.get_ref().set_read_timeout(None)?;
    session.get_ref().set_write_timeout(None)?;

    Ok(Transport::Tls(Box::new(session)))
}

/// Connect to the first reachable resolved address
fn connect_tcp(host: &str, port: u16, deadline: Instant, opts: &ConnectOptions) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Timeout(host.to_string()));
        }

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        match socket.connect_timeout(&SockAddr::from(addr), remaining) {
            Ok(()) => {
                socket.set_nodelay(opts.tcp_nodelay)?;
                socket.set_keepalive(opts.keepalive)?;
                debug!("Connected to {} ({})", host, addr);
                return Ok(socket.into());
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                return Err(Error::Timeout(host.to_string()));
            }
            Err(source) => {
                debug!("Connect to {} failed: {}", addr, source);
                last_error = Some(Error::Connect { addr, source });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::NoAddress(host.to_string())))
}

/// Bound blocking handshake I/O by what is left of the connect timeout
fn set_stream_timeout(stream: &TcpStream, deadline: Instant, host: &str) -> Result<()> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(Error::Timeout(host.to_string()));
    }
    stream.set_read_timeout(Some(remaining))?;
    stream.set_write_timeout(Some(remaining))?;
    Ok(())
}

fn proxy_io(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            Error::Proxy("timed out talking to proxy".to_string())
        }
        io::ErrorKind::UnexpectedEof => Error::Proxy("proxy closed the connection".to_string()),
        _ => Error::Io(e),
    }
}

/// Establish a tunnel with `CONNECT host:port`
fn connect_http_proxy(stream: &mut TcpStream, proxy: &Url, url: &Url, user_agent: &str) -> Result<()> {
    let authority = format!("{}:{}", url.host_str().unwrap_or_default(), uri::effective_port(url)?);

    let mut request = HttpRequest::new(Method::Connect, authority.clone());
    let headers = request.headers_mut();
    headers.set("Host", authority);
    headers.set("Proxy-Connection", "keep-alive");
    headers.set("User-Agent", user_agent);
    if let Some((user, password)) = uri::userinfo(proxy) {
        let credentials = BASE64.encode(format!("{}:{}", user, password));
        headers.set("Proxy-Authorization", format!("Basic {}", credentials));
    }
    stream.write_all(&request.to_wire()).map_err(proxy_io)?;

    // Read byte by byte so nothing past the reply head is consumed
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_HEAD_SIZE {
            return Err(Error::Proxy("CONNECT reply too large".to_string()));
        }
        stream.read_exact(&mut byte).map_err(proxy_io)?;
        head.push(byte[0]);
    }

    let text = String::from_utf8_lossy(&head);
    let status_line = text.lines().next().unwrap_or_default();
    let (_, status, reason) = parse_status_line(status_line)
        .map_err(|e| Error::Proxy(format!("invalid CONNECT reply: {}", e)))?;
    if status.code() != 200 {
        return Err(Error::Proxy(format!(
            "proxy rejected the connection: {} {}",
            status.code(),
            reason
        )));
    }
    Ok(())
}

const SOCKS_VERSION: u8 = 0x05;
const SOCKS_NO_AUTH: u8 = 0x00;
const SOCKS_USER_PASS: u8 = 0x02;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const SOCKS_ATYP_IPV4: u8 = 0x01;
const SOCKS_ATYP_DOMAIN: u8 = 0x03;
const SOCKS_ATYP_IPV6: u8 = 0x04;

/// RFC 1928 CONNECT, with RFC 1929 authentication when the proxy URL has credentials
fn connect_socks5_proxy(stream: &mut TcpStream, proxy: &Url, host: &str, port: u16) -> Result<()> {
    let credentials = uri::userinfo(proxy);

    let greeting: &[u8] = match credentials {
        Some(_) => &[SOCKS_VERSION, 2, SOCKS_NO_AUTH, SOCKS_USER_PASS],
        None => &[SOCKS_VERSION, 1, SOCKS_NO_AUTH],
    };
    stream.write_all(greeting).map_err(proxy_io)?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).map_err(proxy_io)?;
    if reply[0] != SOCKS_VERSION {
        return Err(Error::Proxy("SOCKS5 invalid version".to_string()));
    }

    match (reply[1], &credentials) {
        (SOCKS_NO_AUTH, _) => {}
        (SOCKS_USER_PASS, Some((user, password))) => {
            if user.len() > 255 || password.len() > 255 {
                return Err(Error::Proxy("SOCKS5 credentials too long".to_string()));
            }
            let mut auth = vec![0x01, user.len() as u8];
            auth.extend_from_slice(user.as_bytes());
            auth.push(password.len() as u8);
            auth.extend_from_slice(password.as_bytes());
            stream.write_all(&auth).map_err(proxy_io)?;

            let mut reply = [0u8; 2];
            stream.read_exact(&mut reply).map_err(proxy_io)?;
            if reply[1] != 0x00 {
                return Err(Error::Proxy("SOCKS5 authentication failed".to_string()));
            }
        }
        _ => {
            return Err(Error::Proxy(
                "SOCKS5 no acceptable authentication method".to_string(),
            ))
        }
    }

    if host.len() > 255 {
        return Err(Error::Proxy(format!("host name too long for SOCKS5: {}", host)));
    }
    let mut request = vec![SOCKS_VERSION, SOCKS_CMD_CONNECT, 0x00, SOCKS_ATYP_DOMAIN, host.len() as u8];
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).map_err(proxy_io)?;

    let mut head = [0u8; 5];
    stream.read_exact(&mut head).map_err(proxy_io)?;
    if head[1] != 0x00 {
        return Err(Error::Proxy(format!(
            "SOCKS5 connection request failed (reply {})",
            head[1]
        )));
    }

    // Bound address and port; one address byte is already in `head`
    let remaining = match head[3] {
        SOCKS_ATYP_IPV4 => 4 + 2 - 1,
        SOCKS_ATYP_DOMAIN => head[4] as usize + 2,
        SOCKS_ATYP_IPV6 => 16 + 2 - 1,
        _ => return Err(Error::Proxy("SOCKS5 invalid address type".to_string())),
    };
    let mut tail = vec![0u8; remaining];
    stream.read_exact(&mut tail).map_err(proxy_io)?;
    Ok(())
}
