//! Request orchestration
//!
//! One call to [`perform_request`] is one logical operation: connect, send,
//! follow redirects (reusing the connection when the next hop allows it),
//! collect cookies, echo heads, stream the final body to the output and
//! close the connection. Whatever the outcome, the connection gets a
//! bounded clean shutdown.

use crate::body::Body;
use crate::config::{OperationConfig, RequestInfo};
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::http::tls::TlsConfig;
use crate::http::{self, Connection, HttpClient, HttpRequest, Method, Status};
use crate::net;
use crate::output::{disposition_filename, ContentDecoder, HeaderSink, OutputSink, DEFAULT_REMOTE_NAME};
use crate::redirect::{Next, RedirectContext};
use crate::request::create_request;
use crate::uri;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// How long a closing connection waits for the peer
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Run one request of the invocation, writing its body where `info` says
pub fn perform_request(
    oc: &OperationConfig,
    tls: &TlsConfig,
    jar: Option<&mut CookieJar>,
    headers: Option<&mut HeaderSink>,
    info: &RequestInfo,
) -> Result<Status> {
    let mut url = info.url.clone();
    if let Some(query) = &oc.query {
        uri::append_query(&mut url, query);
    }

    let mut output = output_sink(oc, info, &url);
    transfer(oc, tls, jar, headers, &url, &mut output)
}

/// Pick the body destination for `info`
pub fn output_sink(oc: &OperationConfig, info: &RequestInfo, url: &Url) -> OutputSink {
    let path = match &info.output {
        Some(path) if path.as_path() == Path::new("-") => return OutputSink::stdout(true),
        Some(path) => path.clone(),
        None if info.remote_name => {
            PathBuf::from(uri::last_segment(url).unwrap_or_else(|| DEFAULT_REMOTE_NAME.to_string()))
        }
        None => return OutputSink::stdout(false),
    };

    let path = match &oc.output_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    };
    OutputSink::file(path, oc.create_dirs)
}

/// Run one operation against `url`, writing the final body to `output`
pub fn transfer(
    oc: &OperationConfig,
    tls: &TlsConfig,
    jar: Option<&mut CookieJar>,
    headers: Option<&mut HeaderSink>,
    url: &Url,
    output: &mut OutputSink,
) -> Result<Status> {
    let deadline = oc.max_time.map(|t| Instant::now() + t);

    let result = match open_connection(oc, tls, url, deadline) {
        Ok(mut client) => {
            let result = run(oc, tls, jar, headers, url, output, &mut client, deadline);
            if result.is_err() {
                if let Err(e) = client.shutdown(SHUTDOWN_GRACE) {
                    debug!("Shutdown after failure: {}", e);
                }
            }
            result
        }
        Err(e) => Err(e),
    };

    if result.is_err() && oc.remove_on_error {
        output.remove_partial();
    }
    result
}

fn open_connection(
    oc: &OperationConfig,
    tls: &TlsConfig,
    url: &Url,
    deadline: Option<Instant>,
) -> Result<Connection> {
    let mut connect = oc.connect.clone();
    if let Some(deadline) = deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(http::Error::Timeout.into());
        }
        connect.connect_timeout = connect.connect_timeout.min(remaining);
    }

    let transport = net::open(url, &connect, tls)?;
    let mut client = HttpClient::new(transport);
    client.set_deadline(deadline);
    client.set_rate_limits(oc.limit_rate, oc.limit_rate);
    client.set_body_limit(oc.max_filesize);
    Ok(client)
}

#[allow(clippy::too_many_arguments)]
fn run(
    oc: &OperationConfig,
    tls: &TlsConfig,
    mut jar: Option<&mut CookieJar>,
    mut headers: Option<&mut HeaderSink>,
    url: &Url,
    output: &mut OutputSink,
    client: &mut Connection,
    deadline: Option<Instant>,
) -> Result<Status> {
    let mut request = create_request(oc, url)?;
    let mut redirects = RedirectContext::new(url.clone(), &oc.redirect);
    let mut send_body = true;
    let no_body = Body::None;

    let head = loop {
        let current = redirects.current().clone();
        set_cookie_header(&mut request, jar.as_deref_mut(), &current, oc, redirects.is_trusted());

        let body = if send_body { &oc.body } else { &no_body };
        client.send(&request, &mut *body.source())?;
        let head = client.read_head(*request.method() == Method::Head)?;
        debug!("{} {} -> {}", request.method(), current, head.status().code());

        if let Some(jar) = jar.as_deref_mut() {
            for value in head.headers().get_all("Set-Cookie") {
                jar.add_from_header(&current, value);
            }
        }
        if oc.show_headers {
            output.write_raw(head.raw())?;
        }
        if let Some(sink) = headers.as_deref_mut() {
            sink.write(head.raw())?;
        }

        match redirects.decide(&oc.redirect, request.method(), &head)? {
            Next::Done => break head,
            Next::Follow {
                url: next,
                reuse,
                method_change,
            } => {
                if reuse {
                    client.drain_body()?;
                } else {
                    if let Err(e) = client.shutdown(SHUTDOWN_GRACE) {
                        debug!("Closing connection to {}: {}", current, e);
                    }
                    *client = open_connection(oc, tls, &next, deadline)?;
                }
                let fixed_target = oc.request_target.is_some();
                if !redirects.advance(
                    &mut request,
                    next,
                    method_change,
                    &oc.redirect,
                    oc.auto_referer,
                    fixed_target,
                ) {
                    send_body = false;
                }
            }
        }
    };

    let status = head.status();
    if oc.fail_on_error && status.code() >= 400 {
        return Err(Error::HttpStatus(status.code()));
    }

    if oc.content_disposition {
        if let Some(name) = head
            .headers()
            .get("Content-Disposition")
            .and_then(disposition_filename)
        {
            output.rename(&name);
        }
    }

    let mut decoder = if oc.compressed {
        ContentDecoder::for_encoding(head.headers().get("Content-Encoding"))
    } else {
        ContentDecoder::Identity
    };
    loop {
        let chunk = client.pull_body();
        if !chunk.is_empty() {
            let n = chunk.len();
            let decoded = decoder.decode(chunk).map_err(Error::Decode)?;
            output.write(&decoded)?;
            client.consume_body(n);
        }
        if client.is_complete() {
            break;
        }
        client.read_some()?;
    }
    output.write(&decoder.finish().map_err(Error::Decode)?)?;
    output.finish()?;

    match client.shutdown(SHUTDOWN_GRACE) {
        Ok(()) => {}
        Err(e @ (http::Error::Truncated | http::Error::Timeout)) => {
            debug!("Connection to {} closed uncleanly: {}", redirects.current(), e);
        }
        Err(e) => return Err(e.into()),
    }

    if oc.fail_with_body && status.code() >= 400 {
        return Err(Error::HttpStatus(status.code()));
    }
    Ok(status)
}

/// Rebuild the `Cookie` field for the hop to `url`
///
/// Explicit cookies only go to trusted hops.
fn set_cookie_header(
    request: &mut HttpRequest,
    jar: Option<&mut CookieJar>,
    url: &Url,
    oc: &OperationConfig,
    trusted: bool,
) {
    if jar.is_none() && oc.cookies.is_empty() {
        return;
    }

    let mut pieces = Vec::new();
    if let Some(field) = jar.and_then(|jar| jar.make_field(url)) {
        pieces.push(field);
    }
    if trusted {
        pieces.extend(oc.cookies.iter().cloned());
    }

    let headers = request.headers_mut();
    if pieces.is_empty() {
        headers.remove("Cookie");
    } else {
        headers.set("Cookie", pieces.join("; "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_sink_selection() {
        let url = Url::parse("http://example.com/files/report.pdf").unwrap();
        let oc = OperationConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..OperationConfig::default()
        };

        let mut info = RequestInfo::new(url.clone());
        assert_eq!(output_sink(&oc, &info, &url).path(), None);

        info.remote_name = true;
        assert_eq!(
            output_sink(&oc, &info, &url).path(),
            Some(Path::new("/tmp/out/report.pdf"))
        );

        info.output = Some(PathBuf::from("/abs/file"));
        assert_eq!(output_sink(&oc, &info, &url).path(), Some(Path::new("/abs/file")));

        info.output = Some(PathBuf::from("-"));
        assert_eq!(output_sink(&oc, &info, &url).path(), None);

        let root = Url::parse("http://example.com/").unwrap();
        let info = RequestInfo {
            remote_name: true,
            ..RequestInfo::new(root.clone())
        };
        assert_eq!(
            output_sink(&OperationConfig::default(), &info, &root).path(),
            Some(Path::new(DEFAULT_REMOTE_NAME))
        );
    }

    #[test]
    fn test_cookie_header_on_untrusted_hop() {
        let url = Url::parse("http://example.com/").unwrap();
        let oc = OperationConfig {
            cookies: vec!["explicit=1".to_string()],
            ..OperationConfig::default()
        };
        let mut jar = CookieJar::new();
        jar.add_from_header(&url, "stored=2");

        let mut request = HttpRequest::new(Method::Get, "/");
        set_cookie_header(&mut request, Some(&mut jar), &url, &oc, true);
        assert_eq!(request.headers().get("Cookie"), Some("stored=2; explicit=1"));

        set_cookie_header(&mut request, Some(&mut jar), &url, &oc, false);
        assert_eq!(request.headers().get("Cookie"), Some("stored=2"));

        let other = Url::parse("http://other.example/").unwrap();
        set_cookie_header(&mut request, Some(&mut jar), &other, &oc, false);
        assert!(!request.headers().contains("Cookie"));
    }
}
