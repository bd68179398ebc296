//! Integration tests for the transfer engine
//!
//! Each test runs the real orchestrator against a scripted server on a
//! background thread.

mod common;

use common::{Reply, SharedBuf, TestServer};
use std::fs;
use std::net::TcpListener;
use std::time::Duration;
use vcurl::body::{Body, UrlEncodedForm};
use vcurl::config::{OperationConfig, RequestInfo};
use vcurl::http::Method;
use vcurl::output::OutputSink;
use vcurl::retry::Sleep;
use vcurl::{app, transfer, uri, Error};

#[derive(Default)]
struct Recorder(Vec<Duration>);

impl Sleep for Recorder {
    fn sleep(&mut self, duration: Duration) {
        self.0.push(duration);
    }
}

fn request(url: &str, output: &std::path::Path) -> RequestInfo {
    RequestInfo {
        output: Some(output.to_path_buf()),
        ..RequestInfo::new(uri::parse(url).unwrap())
    }
}

fn form(data: &str) -> Body {
    let mut form = UrlEncodedForm::new();
    form.append_raw(data.as_bytes());
    Body::UrlEncoded(form)
}

fn run_to_buffer(oc: &OperationConfig, url: &str) -> (vcurl::Result<u16>, Vec<u8>) {
    let tls = oc.tls.build().unwrap();
    let buf = SharedBuf::default();
    let mut output = OutputSink::writer(Box::new(buf.clone()), false);
    let url = uri::parse(url).unwrap();
    let result = transfer::transfer(oc, &tls, None, None, &url, &mut output).map(|s| s.code());
    (result, buf.contents())
}

#[test]
fn test_simple_get() {
    let server = TestServer::start(1, |_, _| Reply::ok(b"hello").header("Content-Type", "text/plain"));
    let url = server.url("/greeting?x=1");

    let (result, body) = run_to_buffer(&OperationConfig::default(), &url);
    assert_eq!(result.unwrap(), 200);
    assert_eq!(body, b"hello");

    let (requests, _) = server.finish();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/greeting?x=1");
    assert_eq!(requests[0].header("Accept"), Some("*/*"));
    assert!(requests[0].header("User-Agent").unwrap().starts_with("vcurl/"));
}

#[test]
fn test_303_turns_post_into_get() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::redirect(303, "/result"),
        _ => Reply::ok(b"done"),
    });

    let oc = OperationConfig {
        body: form("a=1&b=2"),
        redirect: vcurl::config::RedirectPolicy {
            follow: true,
            ..Default::default()
        },
        ..OperationConfig::default()
    };
    let (result, body) = run_to_buffer(&oc, &server.url("/submit"));
    assert_eq!(result.unwrap(), 200);
    assert_eq!(body, b"done");

    let (requests, accepts) = server.finish();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].body, b"a=1&b=2");
    assert_eq!(
        requests[0].header("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].target, "/result");
    assert!(requests[1].body.is_empty());
    assert_eq!(requests[1].header("Content-Type"), None);
    assert_eq!(requests[1].header("Content-Length"), None);

    // Same origin and keep-alive: one connection
    assert_eq!(accepts, 1);
    assert_eq!(requests[1].connection, 0);
}

#[test]
fn test_307_keeps_post_and_body() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::redirect(307, "/again").close(),
        _ => Reply::ok(b"ok"),
    });

    let mut oc = OperationConfig {
        body: form("payload=1"),
        ..OperationConfig::default()
    };
    oc.redirect.follow = true;
    let (result, _) = run_to_buffer(&oc, &server.url("/first"));
    assert_eq!(result.unwrap(), 200);

    let (requests, accepts) = server.finish();
    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].body, b"payload=1");

    // Connection: close forces a reconnect
    assert_eq!(accepts, 2);
}

#[test]
fn test_redirect_with_body_until_close_reconnects() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::redirect(302, "/b").body(b"moved").until_close(),
        _ => Reply::ok(b"arrived"),
    });

    let mut oc = OperationConfig::default();
    oc.redirect.follow = true;
    let (result, body) = run_to_buffer(&oc, &server.url("/a"));
    assert_eq!(result.unwrap(), 200);
    assert_eq!(body, b"arrived");

    let (requests, accepts) = server.finish();
    assert_eq!(requests[1].target, "/b");
    assert_eq!(accepts, 2);
    assert_eq!(requests[1].connection, 1);
}

#[test]
fn test_302_turns_put_into_get() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::redirect(302, "/moved"),
        _ => Reply::ok(b""),
    });

    let mut oc = OperationConfig {
        method: Some(Method::Put),
        body: form("x=1"),
        ..OperationConfig::default()
    };
    oc.redirect.follow = true;
    let (result, _) = run_to_buffer(&oc, &server.url("/put"));
    assert_eq!(result.unwrap(), 200);

    let (requests, _) = server.finish();
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[1].method, "GET");
    assert!(requests[1].body.is_empty());
}

#[test]
fn test_cross_origin_redirect_drops_credentials() {
    let target = TestServer::start(1, |_, _| Reply::ok(b"other"));
    let port = target.addr.port();
    let location = format!("http://localhost:{}/landing", port);
    let origin = TestServer::start(1, move |_, _| Reply::redirect(302, &location));

    let mut oc = OperationConfig {
        userpwd: Some("user:secret".to_string()),
        cookies: vec!["explicit=1".to_string()],
        ..OperationConfig::default()
    };
    oc.redirect.follow = true;
    let (result, body) = run_to_buffer(&oc, &origin.url("/start"));
    assert_eq!(result.unwrap(), 200);
    assert_eq!(body, b"other");

    let (first, _) = origin.finish();
    assert!(first[0].header("Authorization").unwrap().starts_with("Basic "));
    assert_eq!(first[0].header("Cookie"), Some("explicit=1"));

    let (second, _) = target.finish();
    assert_eq!(second[0].header("Authorization"), None);
    assert_eq!(second[0].header("Cookie"), None);
    let host = format!("localhost:{}", port);
    assert_eq!(second[0].header("Host"), Some(host.as_str()));
    assert_eq!(second[0].target, "/landing");
}

#[test]
fn test_redirect_limit() {
    let server = TestServer::start(3, |_, _| Reply::redirect(302, "/loop"));
    let mut oc = OperationConfig::default();
    oc.redirect.follow = true;
    oc.redirect.max_redirects = 2;

    let (result, _) = run_to_buffer(&oc, &server.url("/loop"));
    assert!(matches!(result, Err(Error::TooManyRedirects(2))));
    let (requests, _) = server.finish();
    assert_eq!(requests.len(), 3);
}

#[test]
fn test_redirect_not_followed_by_default() {
    let server = TestServer::start(1, |_, _| Reply::redirect(301, "/elsewhere").body(b"moved"));
    let (result, body) = run_to_buffer(&OperationConfig::default(), &server.url("/"));
    assert_eq!(result.unwrap(), 301);
    assert_eq!(body, b"moved");
    server.finish();
}

#[test]
fn test_cookies_carry_across_requests() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::ok(b"first")
            .header("Set-Cookie", "session=abc; Path=/")
            .header("Set-Cookie", "persist=1; Max-Age=3600"),
        _ => Reply::ok(b"second"),
    });

    let dir = tempfile::tempdir().unwrap();
    let jar_path = dir.path().join("jar.txt");
    let oc = OperationConfig {
        requests: vec![
            request(&server.url("/login"), &dir.path().join("one")),
            request(&server.url("/account"), &dir.path().join("two")),
        ],
        cookie_jar: Some(jar_path.clone()),
        ..OperationConfig::default()
    };
    app::run_with(&oc, &mut Recorder::default()).unwrap();

    let (requests, _) = server.finish();
    assert_eq!(requests[0].header("Cookie"), None);
    assert_eq!(requests[1].header("Cookie"), Some("session=abc; persist=1"));

    let saved = fs::read_to_string(&jar_path).unwrap();
    assert!(saved.starts_with("# Netscape HTTP Cookie File"));
    assert!(saved.contains("\tsession\tabc"));
    assert!(saved.contains("\tpersist\t1"));
    assert_eq!(fs::read(dir.path().join("two")).unwrap(), b"second");
}

#[test]
fn test_retry_transient_statuses() {
    let server = TestServer::start(4, |i, _| {
        if i < 3 {
            Reply::new(503, "Service Unavailable").body(b"busy")
        } else {
            Reply::ok(b"finally")
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut oc = OperationConfig {
        requests: vec![request(&server.url("/flaky"), &out)],
        ..OperationConfig::default()
    };
    oc.retry.retries = 5;
    oc.retry.delay = Some(Duration::from_secs(2));

    let mut sleeper = Recorder::default();
    app::run_with(&oc, &mut sleeper).unwrap();

    assert_eq!(sleeper.0, [Duration::from_secs(2); 3]);
    assert_eq!(fs::read(&out).unwrap(), b"finally");
    let (requests, accepts) = server.finish();
    assert_eq!(requests.len(), 4);
    assert_eq!(accepts, 4);
}

#[test]
fn test_retry_budget_exhausted() {
    let server = TestServer::start(3, |_, _| Reply::new(502, "Bad Gateway").body(b"down"));

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut oc = OperationConfig {
        requests: vec![request(&server.url("/"), &out)],
        ..OperationConfig::default()
    };
    oc.retry.retries = 2;

    let mut sleeper = Recorder::default();
    app::run_with(&oc, &mut sleeper).unwrap();
    assert_eq!(sleeper.0, [Duration::from_secs(2), Duration::from_secs(4)]);

    let (requests, _) = server.finish();
    assert_eq!(requests.len(), 3);
    assert_eq!(fs::read(&out).unwrap(), b"down");
}

#[test]
fn test_fail_on_error_is_not_retried() {
    let server = TestServer::start(1, |_, _| Reply::new(503, "Service Unavailable"));

    let dir = tempfile::tempdir().unwrap();
    let mut oc = OperationConfig {
        requests: vec![request(&server.url("/"), &dir.path().join("out"))],
        fail_on_error: true,
        ..OperationConfig::default()
    };
    oc.retry.retries = 3;

    let mut sleeper = Recorder::default();
    let result = app::run_with(&oc, &mut sleeper);
    assert!(matches!(result, Err(Error::HttpStatus(503))));
    assert!(sleeper.0.is_empty());

    let (requests, _) = server.finish();
    assert_eq!(requests.len(), 1);
}

#[test]
fn test_first_failure_stops_run_and_keeps_jar() {
    let server = TestServer::start(1, |_, _| {
        Reply::new(404, "Not Found").header("Set-Cookie", "seen=1; Max-Age=3600")
    });

    let dir = tempfile::tempdir().unwrap();
    let jar_path = dir.path().join("jar.txt");
    let oc = OperationConfig {
        requests: vec![
            request(&server.url("/missing"), &dir.path().join("one")),
            request(&server.url("/next"), &dir.path().join("two")),
        ],
        cookie_jar: Some(jar_path.clone()),
        fail_on_error: true,
        ..OperationConfig::default()
    };

    let result = app::run_with(&oc, &mut Recorder::default());
    assert!(matches!(result, Err(Error::HttpStatus(404))));

    let (requests, _) = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "/missing");
    assert!(!jar_path.exists());
    assert!(!dir.path().join("two").exists());
}

#[test]
fn test_connection_refused_not_retried_by_default() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let mut oc = OperationConfig {
        requests: vec![request(
            &format!("http://127.0.0.1:{}/", port),
            &dir.path().join("out"),
        )],
        ..OperationConfig::default()
    };
    oc.retry.retries = 3;

    let mut sleeper = Recorder::default();
    let err = app::run_with(&oc, &mut sleeper).unwrap_err();
    assert!(err.is_connection_refused());
    assert!(sleeper.0.is_empty());

    oc.retry.connrefused = true;
    let mut sleeper = Recorder::default();
    assert!(app::run_with(&oc, &mut sleeper).is_err());
    assert_eq!(sleeper.0.len(), 3);
}

#[test]
fn test_fail_on_error_skips_body() {
    let server = TestServer::start(1, |_, _| Reply::new(404, "Not Found").body(b"missing"));
    let oc = OperationConfig {
        fail_on_error: true,
        ..OperationConfig::default()
    };
    let (result, body) = run_to_buffer(&oc, &server.url("/nope"));
    assert!(matches!(result, Err(Error::HttpStatus(404))));
    assert!(body.is_empty());
    server.finish();
}

#[test]
fn test_fail_with_body_writes_body() {
    let server = TestServer::start(1, |_, _| Reply::new(500, "Internal Server Error").body(b"oops"));
    let oc = OperationConfig {
        fail_with_body: true,
        ..OperationConfig::default()
    };
    let (result, body) = run_to_buffer(&oc, &server.url("/"));
    assert!(matches!(result, Err(Error::HttpStatus(500))));
    assert_eq!(body, b"oops");
    server.finish();
}

#[test]
fn test_include_echoes_every_hop() {
    let server = TestServer::start(2, |i, _| match i {
        0 => Reply::redirect(302, "/next"),
        _ => Reply::ok(b"body").header("X-Hop", "2"),
    });
    let mut oc = OperationConfig {
        show_headers: true,
        ..OperationConfig::default()
    };
    oc.redirect.follow = true;

    let (result, output) = run_to_buffer(&oc, &server.url("/"));
    assert_eq!(result.unwrap(), 200);
    let output = String::from_utf8(output).unwrap();
    assert!(output.starts_with("HTTP/1.1 302 Redirect\r\n"));
    assert!(output.contains("HTTP/1.1 200 OK\r\nX-Hop: 2\r\n"));
    assert!(output.ends_with("\r\n\r\nbody"));
    server.finish();
}

#[test]
fn test_head_request() {
    let server = TestServer::start(1, |_, _| Reply::ok(b"").header("X-Size", "10"));
    let oc = OperationConfig {
        no_body: true,
        ..OperationConfig::default()
    };
    let (result, _) = run_to_buffer(&oc, &server.url("/"));
    assert_eq!(result.unwrap(), 200);
    let (requests, _) = server.finish();
    assert_eq!(requests[0].method, "HEAD");
}

#[test]
fn test_explicit_method_and_headers() {
    let server = TestServer::start(1, |_, _| Reply::ok(b""));
    let oc = OperationConfig {
        method: Some(Method::Delete),
        headers: vec![("X-Custom".to_string(), "yes".to_string())],
        omit_headers: vec!["Accept".to_string()],
        ..OperationConfig::default()
    };
    let (result, _) = run_to_buffer(&oc, &server.url("/item/1"));
    assert_eq!(result.unwrap(), 200);

    let (requests, _) = server.finish();
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].header("X-Custom"), Some("yes"));
    assert_eq!(requests[0].header("Accept"), None);
}

#[test]
fn test_remote_name_and_remove_on_error() {
    let server = TestServer::start(1, |_, _| Reply::ok(b"file content"));
    let dir = tempfile::tempdir().unwrap();
    let oc = OperationConfig {
        requests: vec![RequestInfo {
            remote_name: true,
            ..RequestInfo::new(uri::parse(&server.url("/files/report.txt")).unwrap())
        }],
        output_dir: Some(dir.path().join("nested")),
        create_dirs: true,
        ..OperationConfig::default()
    };
    app::run_with(&oc, &mut Recorder::default()).unwrap();
    assert_eq!(
        fs::read(dir.path().join("nested/report.txt")).unwrap(),
        b"file content"
    );
    server.finish();

    let server = TestServer::start(1, |_, _| Reply::ok(&[b'x'; 64]));
    let out = dir.path().join("partial");
    let oc = OperationConfig {
        requests: vec![request(&server.url("/big"), &out)],
        max_filesize: Some(16),
        remove_on_error: true,
        ..OperationConfig::default()
    };
    assert!(app::run_with(&oc, &mut Recorder::default()).is_err());
    assert!(!out.exists());
    server.finish();
}

#[test]
#[ignore = "requires network access"]
fn test_public_redirect_chain() {
    let dir = tempfile::tempdir().unwrap();
    let mut oc = OperationConfig {
        requests: vec![request("https://httpstat.us/301", &dir.path().join("out"))],
        ..OperationConfig::default()
    };
    oc.redirect.follow = true;
    app::run_with(&oc, &mut Recorder::default()).unwrap();
}
