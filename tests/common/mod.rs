//! Scripted HTTP/1.1 server for integration tests
//!
//! The server answers requests one at a time from a handler closure and
//! records what it received. It stops after a fixed number of requests.

#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// A request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Index of the connection the request arrived on
    pub connection: usize,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A canned response
pub struct Reply {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    close: bool,
    framed: bool,
}

impl Reply {
    pub fn new(status: u16, reason: &'static str) -> Self {
        Reply {
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
            close: false,
            framed: true,
        }
    }

    pub fn ok(body: &[u8]) -> Self {
        Reply::new(200, "OK").body(body)
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Reply::new(status, "Redirect").header("Location", location)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Close the connection after this response
    pub fn close(mut self) -> Self {
        self.close = true;
        self
    }

    /// Send no Content-Length; the body ends when the server closes
    pub fn until_close(mut self) -> Self {
        self.framed = false;
        self
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if self.framed {
            out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        if self.close {
            out.push_str("Connection: close\r\n");
        }
        out.push_str("\r\n");
        let mut wire = out.into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    accepts: Arc<Mutex<usize>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Serve `expected` requests, answering each with `handler(index, request)`
    pub fn start<F>(expected: usize, handler: F) -> Self
    where
        F: FnMut(usize, &Recorded) -> Reply + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        TestServer::start_on(listener, expected, handler)
    }

    pub fn start_on<F>(listener: TcpListener, expected: usize, mut handler: F) -> Self
    where
        F: FnMut(usize, &Recorded) -> Reply + Send + 'static,
    {
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let accepts = Arc::new(Mutex::new(0));

        let recorded = Arc::clone(&requests);
        let accepted = Arc::clone(&accepts);
        let handle = thread::spawn(move || {
            let mut served = 0;
            while served < expected {
                let (stream, _) = listener.accept().unwrap();
                let connection = {
                    let mut accepts = accepted.lock().unwrap();
                    *accepts += 1;
                    *accepts - 1
                };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut writer = stream;

                while served < expected {
                    let request = match read_request(&mut reader, connection) {
                        Ok(Some(request)) => request,
                        Ok(None) | Err(_) => break,
                    };
                    let reply = handler(served, &request);
                    recorded.lock().unwrap().push(request);
                    served += 1;

                    if writer.write_all(&reply.to_wire()).is_err() || reply.close {
                        break;
                    }
                    if !reply.framed {
                        let _ = writer.shutdown(Shutdown::Write);
                        break;
                    }
                }
                drain_until_close(reader);
            }
        });

        TestServer {
            addr,
            requests,
            accepts,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for the server to finish and return what it received
    pub fn finish(self) -> (Vec<Recorded>, usize) {
        self.handle.join().unwrap();
        let requests = self.requests.lock().unwrap().clone();
        let accepts = *self.accepts.lock().unwrap();
        (requests, accepts)
    }
}

fn read_request(reader: &mut BufReader<TcpStream>, connection: usize) -> io::Result<Option<Recorded>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let mut parts = line.trim_end().splitn(3, ' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    Ok(Some(Recorded {
        method,
        target,
        headers,
        body,
        connection,
    }))
}

/// Wait for the client to close its side so its shutdown completes cleanly
fn drain_until_close(mut reader: BufReader<TcpStream>) {
    let _ = reader
        .get_ref()
        .set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let mut sink = [0u8; 1024];
    while let Ok(n) = reader.read(&mut sink) {
        if n == 0 {
            break;
        }
    }
}

/// In-memory writer shared with the test
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
