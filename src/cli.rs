//! Command-line surface
//!
//! [`Args`] mirrors the familiar curl option names. [`Args::into_config`]
//! validates them and produces the [`OperationConfig`] the rest of the
//! crate runs on.

use crate::body::{self, Body, MultipartForm, UrlEncodedForm};
use crate::config::{OperationConfig, RequestInfo};
use crate::error::{Error, Result};
use crate::http::message::is_token;
use crate::http::tls::TlsVersion;
use crate::http::Method;
use crate::uri;
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "vcurl", version, about = "Transfer data from or to an HTTP server", long_about = None)]
pub struct Args {
    /// URLs to fetch
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Request method to use
    #[arg(short = 'X', long = "request", value_name = "METHOD")]
    pub request: Option<String>,

    /// Fetch the headers only
    #[arg(short = 'I', long)]
    pub head: bool,

    /// Pass a custom header ("Name: value", "Name:" removes, "Name;" sends empty)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// HTTP POST data (@file reads a file)
    #[arg(short = 'd', long = "data", value_name = "DATA")]
    pub data: Vec<String>,

    /// HTTP POST data, files sent as is
    #[arg(long = "data-binary", value_name = "DATA")]
    pub data_binary: Vec<String>,

    /// HTTP POST data, URL-encoded
    #[arg(long = "data-urlencode", value_name = "DATA")]
    pub data_urlencode: Vec<String>,

    /// Multipart form field (name=value, name=@file, name=<file)
    #[arg(short = 'F', long = "form", value_name = "NAME=CONTENT")]
    pub form: Vec<String>,

    /// Put the post data in the URL and use GET
    #[arg(short = 'G', long)]
    pub get: bool,

    /// Write output to a file instead of stdout, one per URL
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Vec<PathBuf>,

    /// Write output to a file named as the remote file
    #[arg(short = 'O', long = "remote-name")]
    pub remote_name: bool,

    /// Directory to save files in
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Create necessary local directory hierarchy
    #[arg(long = "create-dirs")]
    pub create_dirs: bool,

    /// Use the header-provided filename with -O
    #[arg(short = 'J', long = "remote-header-name", requires = "remote_name")]
    pub remote_header_name: bool,

    /// Remove output file on errors
    #[arg(long = "remove-on-error")]
    pub remove_on_error: bool,

    /// Include response headers in the output
    #[arg(short = 'i', long)]
    pub include: bool,

    /// Write the received headers to FILE
    #[arg(short = 'D', long = "dump-header", value_name = "FILE")]
    pub dump_header: Option<PathBuf>,

    /// Fail fast with no output on HTTP errors
    #[arg(short = 'f', long)]
    pub fail: bool,

    /// Fail on HTTP errors but save the body
    #[arg(long = "fail-with-body", conflicts_with = "fail")]
    pub fail_with_body: bool,

    /// Follow redirects
    #[arg(short = 'L', long)]
    pub location: bool,

    /// Maximum number of redirects allowed (-1 for no limit)
    #[arg(long = "max-redirs", value_name = "NUM", allow_hyphen_values = true)]
    pub max_redirs: Option<i64>,

    /// Do not switch to GET after following a 301
    #[arg(long)]
    pub post301: bool,

    /// Do not switch to GET after following a 302
    #[arg(long)]
    pub post302: bool,

    /// Do not switch to GET after following a 303
    #[arg(long)]
    pub post303: bool,

    /// Send credentials to every host redirected to
    #[arg(long = "location-trusted")]
    pub location_trusted: bool,

    /// Protocols allowed on redirect (comma separated)
    #[arg(long = "proto-redir", value_name = "PROTOCOLS")]
    pub proto_redir: Option<String>,

    /// Retry request if transient problems occur
    #[arg(long, value_name = "NUM", default_value_t = 0)]
    pub retry: u32,

    /// Wait time between retries
    #[arg(long = "retry-delay", value_name = "SECONDS", value_parser = parse_seconds)]
    pub retry_delay: Option<Duration>,

    /// Retry only within this period
    #[arg(long = "retry-max-time", value_name = "SECONDS", value_parser = parse_seconds)]
    pub retry_max_time: Option<Duration>,

    /// Retry on connection refused
    #[arg(long = "retry-connrefused")]
    pub retry_connrefused: bool,

    /// Retry all errors
    #[arg(long = "retry-all-errors")]
    pub retry_all_errors: bool,

    /// Maximum time allowed for each transfer
    #[arg(short = 'm', long = "max-time", value_name = "SECONDS", value_parser = parse_seconds)]
    pub max_time: Option<Duration>,

    /// Maximum time allowed for connection
    #[arg(long = "connect-timeout", value_name = "SECONDS", value_parser = parse_seconds)]
    pub connect_timeout: Option<Duration>,

    /// Send cookies from string ("a=b; c=d") or load them from a file
    #[arg(short = 'b', long = "cookie", value_name = "DATA|FILE")]
    pub cookie: Vec<String>,

    /// Write cookies to FILE after the operation
    #[arg(short = 'c', long = "cookie-jar", value_name = "FILE")]
    pub cookie_jar: Option<PathBuf>,

    /// Ignore session cookies read from file
    #[arg(short = 'j', long = "junk-session-cookies")]
    pub junk_session_cookies: bool,

    /// Send User-Agent NAME to server
    #[arg(short = 'A', long = "user-agent", value_name = "NAME")]
    pub user_agent: Option<String>,

    /// Referrer URL (append ";auto" to follow redirects)
    #[arg(short = 'e', long = "referer", value_name = "URL")]
    pub referer: Option<String>,

    /// Server user and password
    #[arg(short = 'u', long = "user", value_name = "USER:PASSWORD")]
    pub user: Option<String>,

    /// Retrieve only the bytes within RANGE
    #[arg(short = 'r', long = "range", value_name = "RANGE")]
    pub range: Option<String>,

    /// Resumed transfer offset
    #[arg(short = 'C', long = "continue-at", value_name = "OFFSET")]
    pub continue_at: Option<u64>,

    /// Request compressed response
    #[arg(long)]
    pub compressed: bool,

    /// Use HTTP 1.0
    #[arg(short = '0', long = "http1.0")]
    pub http10: bool,

    /// Specify the target for this request
    #[arg(long = "request-target", value_name = "PATH")]
    pub request_target: Option<String>,

    /// Fail when the URL contains credentials
    #[arg(long = "disallow-username-in-url")]
    pub disallow_username_in_url: bool,

    /// Use this proxy (http:// or socks5://)
    #[arg(short = 'x', long = "proxy", value_name = "[PROTOCOL://]HOST[:PORT]")]
    pub proxy: Option<String>,

    /// Use the TCP_NODELAY option
    #[arg(long = "tcp-nodelay")]
    pub tcp_nodelay: bool,

    /// Disable TCP keepalive on the connection
    #[arg(long = "no-keepalive")]
    pub no_keepalive: bool,

    /// Allow insecure server connections
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// CA certificate to verify peer against
    #[arg(long = "cacert", value_name = "FILE")]
    pub cacert: Option<PathBuf>,

    /// Use TLSv1.0 or greater
    #[arg(long = "tlsv1.0")]
    pub tlsv1_0: bool,

    /// Use TLSv1.1 or greater
    #[arg(long = "tlsv1.1")]
    pub tlsv1_1: bool,

    /// Use TLSv1.2 or greater
    #[arg(long = "tlsv1.2")]
    pub tlsv1_2: bool,

    /// Use TLSv1.3 or greater
    #[arg(long = "tlsv1.3")]
    pub tlsv1_3: bool,

    /// Set maximum allowed TLS version
    #[arg(long = "tls-max", value_name = "VERSION", value_parser = parse_tls_version)]
    pub tls_max: Option<TlsVersion>,

    /// SSL ciphers to use
    #[arg(long, value_name = "LIST")]
    pub ciphers: Option<String>,

    /// Maximum file size to download
    #[arg(long = "max-filesize", value_name = "BYTES", value_parser = parse_size)]
    pub max_filesize: Option<u64>,

    /// Limit transfer speed to RATE bytes per second
    #[arg(long = "limit-rate", value_name = "SPEED", value_parser = parse_size)]
    pub limit_rate: Option<u64>,

    /// Make the operation more talkative
    #[arg(short = 'v', long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Silent mode
    #[arg(short = 's', long)]
    pub silent: bool,
}

enum HeaderArg {
    Set(String, String),
    Omit(String),
}

impl Args {
    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.silent {
            "error"
        } else {
            "warn"
        }
    }

    /// Validate the arguments and build the run configuration
    pub fn into_config(self) -> Result<OperationConfig> {
        let mut oc = OperationConfig::default();

        if self.output.len() > self.urls.len() {
            return Err(Error::Config("more --output options than URLs".to_string()));
        }
        let mut outputs = self.output.into_iter();
        for raw in &self.urls {
            oc.requests.push(RequestInfo {
                url: uri::parse(raw)?,
                output: outputs.next(),
                remote_name: self.remote_name,
            });
        }

        oc.method = self
            .request
            .as_deref()
            .map(|m| {
                m.parse::<Method>()
                    .map_err(|_| Error::Config(format!("invalid request method: {}", m)))
            })
            .transpose()?;
        oc.no_body = self.head;
        oc.http10 = self.http10;
        oc.request_target = self.request_target;
        oc.user_agent = self.user_agent;
        oc.userpwd = self.user.map(|u| if u.contains(':') { u } else { format!("{}:", u) });
        oc.range = self.range;
        oc.resume_from = self.continue_at;
        oc.compressed = self.compressed;
        oc.disallow_username_in_url = self.disallow_username_in_url;

        for header in &self.headers {
            match parse_header(header)? {
                HeaderArg::Set(name, value) => oc.headers.push((name, value)),
                HeaderArg::Omit(name) => oc.omit_headers.push(name),
            }
        }

        if let Some(referer) = self.referer {
            match referer.strip_suffix(";auto") {
                Some(url) => {
                    oc.auto_referer = true;
                    if !url.is_empty() {
                        oc.referer = Some(url.to_string());
                    }
                }
                None => oc.referer = Some(referer),
            }
        }

        let has_data =
            !self.data.is_empty() || !self.data_binary.is_empty() || !self.data_urlencode.is_empty();
        if has_data && !self.form.is_empty() {
            return Err(Error::Config("--data and --form cannot be combined".to_string()));
        }
        if has_data && self.head {
            return Err(Error::Config("--data and --head cannot be combined".to_string()));
        }

        let body = if !self.form.is_empty() {
            let mut form = MultipartForm::new();
            for field in &self.form {
                parse_form_field(&mut form, field)?;
            }
            Body::Multipart(form)
        } else if has_data {
            let mut form = UrlEncodedForm::new();
            for data in &self.data {
                form.append_raw(&read_data(data, true)?);
            }
            for data in &self.data_binary {
                form.append_raw(&read_data(data, false)?);
            }
            for data in &self.data_urlencode {
                append_urlencode(&mut form, data)?;
            }
            Body::UrlEncoded(form)
        } else {
            Body::None
        };

        if self.get {
            match body {
                Body::Multipart(_) => {
                    return Err(Error::Config("--get and --form cannot be combined".to_string()))
                }
                Body::UrlEncoded(form) => {
                    oc.query = Some(String::from_utf8_lossy(form.as_bytes()).into_owned());
                }
                Body::None => {}
            }
        } else {
            oc.body = body;
        }

        oc.redirect.follow = self.location;
        if let Some(max) = self.max_redirs {
            oc.redirect.max_redirects = u32::try_from(max).unwrap_or(u32::MAX);
            if max < -1 {
                return Err(Error::Config(format!("invalid --max-redirs: {}", max)));
            }
        }
        oc.redirect.post301 = self.post301;
        oc.redirect.post302 = self.post302;
        oc.redirect.post303 = self.post303;
        oc.redirect.unrestricted_auth = self.location_trusted;
        if let Some(protocols) = self.proto_redir {
            oc.redirect.allowed_protocols = parse_protocols(&protocols)?;
        }

        oc.retry.retries = self.retry;
        oc.retry.delay = self.retry_delay;
        oc.retry.max_time = self.retry_max_time;
        oc.retry.connrefused = self.retry_connrefused;
        oc.retry.all_errors = self.retry_all_errors;

        oc.max_time = self.max_time;
        if let Some(timeout) = self.connect_timeout {
            oc.connect.connect_timeout = timeout;
        }
        oc.connect.tcp_nodelay = self.tcp_nodelay;
        oc.connect.keepalive = !self.no_keepalive;
        oc.connect.proxy = self.proxy.as_deref().map(uri::parse).transpose()?;
        if let Some(agent) = &oc.user_agent {
            oc.connect.user_agent = agent.clone();
        }

        oc.tls.insecure = self.insecure;
        oc.tls.ca_file = self.cacert;
        oc.tls.min_version = [
            (self.tlsv1_3, TlsVersion::Tls13),
            (self.tlsv1_2, TlsVersion::Tls12),
            (self.tlsv1_1, TlsVersion::Tls11),
            (self.tlsv1_0, TlsVersion::Tls10),
        ]
        .into_iter()
        .find_map(|(set, version)| set.then_some(version));
        oc.tls.max_version = self.tls_max;
        oc.tls.ciphers = self.ciphers;

        oc.max_filesize = self.max_filesize;
        oc.limit_rate = self.limit_rate;

        oc.fail_on_error = self.fail;
        oc.fail_with_body = self.fail_with_body;
        oc.show_headers = self.include;
        oc.dump_header = self.dump_header;
        oc.output_dir = self.output_dir;
        oc.create_dirs = self.create_dirs;
        oc.remove_on_error = self.remove_on_error;
        oc.content_disposition = self.remote_header_name;

        for cookie in &self.cookie {
            if cookie.contains('=') {
                oc.cookies.extend(
                    cookie
                        .split(';')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from),
                );
            } else {
                oc.cookie_files.push(PathBuf::from(cookie));
            }
        }
        oc.cookie_jar = self.cookie_jar;
        oc.junk_session_cookies = self.junk_session_cookies;

        Ok(oc)
    }
}

fn parse_header(arg: &str) -> Result<HeaderArg> {
    let invalid = || Error::Config(format!("invalid header: {}", arg));

    if let Some((name, value)) = arg.split_once(':') {
        let name = name.trim();
        if !is_token(name) {
            return Err(invalid());
        }
        let value = value.trim();
        return Ok(if value.is_empty() {
            HeaderArg::Omit(name.to_string())
        } else {
            HeaderArg::Set(name.to_string(), value.to_string())
        });
    }

    match arg.trim().strip_suffix(';') {
        Some(name) if is_token(name.trim()) => {
            Ok(HeaderArg::Set(name.trim().to_string(), String::new()))
        }
        _ => Err(invalid()),
    }
}

/// Contents of a `-d` argument; `@file` reads a file, `@-` stdin
fn read_data(arg: &str, strip_newlines: bool) -> Result<Vec<u8>> {
    let Some(path) = arg.strip_prefix('@') else {
        return Ok(arg.as_bytes().to_vec());
    };

    let mut data = if path == "-" {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .map_err(|e| body::Error::file("-", e))?;
        data
    } else {
        fs::read(path).map_err(|e| body::Error::file(path, e))?
    };
    if strip_newlines {
        data.retain(|&b| b != b'\r' && b != b'\n');
    }
    Ok(data)
}

/// `--data-urlencode` forms: `content`, `=content`, `name=content`, `@file`, `name@file`
fn append_urlencode(form: &mut UrlEncodedForm, arg: &str) -> Result<()> {
    if let Some((name, content)) = arg.split_once('=') {
        if name.is_empty() {
            form.append_value(content);
        } else {
            form.append(name, content);
        }
        return Ok(());
    }

    if let Some((name, path)) = arg.split_once('@') {
        let name = (!name.is_empty()).then_some(name);
        if path == "-" {
            form.append_reader(name, io::stdin())
                .map_err(|e| body::Error::file("-", e))?;
        } else {
            form.append_file(name, Path::new(path))?;
        }
        return Ok(());
    }

    form.append_value(arg);
    Ok(())
}

/// `-F name=value[;type=...][;filename=...]`, `name=@path` or `name=<path`
fn parse_form_field(form: &mut MultipartForm, arg: &str) -> Result<()> {
    let (name, rest) = arg
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("invalid form field: {}", arg)))?;

    let mut pieces = rest.split(';');
    let mut value = pieces.next().unwrap_or_default().to_string();
    let mut content_type = None;
    let mut filename = None;
    for piece in pieces {
        let trimmed = piece.trim();
        if let Some(ct) = trimmed.strip_prefix("type=") {
            content_type = Some(ct.to_string());
        } else if let Some(file) = trimmed.strip_prefix("filename=") {
            filename = Some(file.trim_matches('"').to_string());
        } else {
            // Part of the value
            value.push(';');
            value.push_str(piece);
        }
    }

    if let Some(path) = value.strip_prefix('@') {
        form.append_file(name, path, filename, content_type)?;
    } else if let Some(path) = value.strip_prefix('<') {
        let text = fs::read_to_string(path).map_err(|e| body::Error::file(path, e))?;
        form.append_text(name, text, content_type);
    } else {
        form.append_text(name, value, content_type);
    }
    Ok(())
}

fn parse_protocols(list: &str) -> Result<Vec<String>> {
    let protocols: Vec<String> = list
        .trim_start_matches('=')
        .split(',')
        .map(|p| p.trim().trim_start_matches('+').to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if let Some(unknown) = protocols.iter().find(|p| !matches!(p.as_str(), "http" | "https")) {
        return Err(Error::Config(format!("unsupported protocol in --proto-redir: {}", unknown)));
    }
    Ok(protocols)
}

/// Sizes like `500`, `10K`, `2M` or `1G`
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last() {
        Some('k' | 'K') => (&s[..s.len() - 1], 1 << 10),
        Some('m' | 'M') => (&s[..s.len() - 1], 1 << 20),
        Some('g' | 'G') => (&s[..s.len() - 1], 1 << 30),
        _ => (s, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid size: {}", s))
}

/// Seconds, fractions allowed
pub fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| format!("invalid number of seconds: {}", s))
}

fn parse_tls_version(s: &str) -> std::result::Result<TlsVersion, String> {
    s.parse::<TlsVersion>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(args: &[&str]) -> Result<OperationConfig> {
        let args = Args::try_parse_from(std::iter::once("vcurl").chain(args.iter().copied()))
            .expect("arguments parse");
        args.into_config()
    }

    #[test]
    fn test_minimal() {
        let oc = config(&["example.com"]).unwrap();
        assert_eq!(oc.requests.len(), 1);
        assert_eq!(oc.requests[0].url.as_str(), "http://example.com/");
        assert!(oc.body.is_none());
        assert!(!oc.redirect.follow);
    }

    #[test]
    fn test_headers() {
        let oc = config(&[
            "-H", "X-Test: a b",
            "-H", "Accept:",
            "-H", "X-Empty;",
            "http://a.test/",
        ])
        .unwrap();
        assert_eq!(
            oc.headers,
            [
                ("X-Test".to_string(), "a b".to_string()),
                ("X-Empty".to_string(), String::new())
            ]
        );
        assert_eq!(oc.omit_headers, ["Accept"]);

        assert!(matches!(
            config(&["-H", "no colon", "http://a.test/"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_data_forms() {
        let oc = config(&[
            "-d", "a=1",
            "--data-urlencode", "q=x y",
            "--data-urlencode", "=&",
            "http://a.test/",
        ])
        .unwrap();
        match &oc.body {
            Body::UrlEncoded(form) => assert_eq!(form.as_bytes(), b"a=1&q=x+y&%26"),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_data_file_strips_newlines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"a=1\r\nb=2\n").unwrap();
        let arg = format!("@{}", file.path().display());

        let oc = config(&["-d", &arg, "http://a.test/"]).unwrap();
        match &oc.body {
            Body::UrlEncoded(form) => assert_eq!(form.as_bytes(), b"a=1b=2"),
            other => panic!("unexpected body {:?}", other),
        }

        let oc = config(&["--data-binary", &arg, "http://a.test/"]).unwrap();
        match &oc.body {
            Body::UrlEncoded(form) => assert_eq!(form.as_bytes(), b"a=1\r\nb=2\n"),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_get_moves_data_to_query() {
        let oc = config(&["-G", "-d", "q=1", "http://a.test/"]).unwrap();
        assert!(oc.body.is_none());
        assert_eq!(oc.query.as_deref(), Some("q=1"));
    }

    #[test]
    fn test_form_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"content").unwrap();
        let upload = format!("file=@{};type=text/plain;filename=up.txt", file.path().display());

        let oc = config(&["-F", "text=a;b", "-F", &upload, "http://a.test/"]).unwrap();
        let Body::Multipart(form) = &oc.body else {
            panic!("expected multipart body");
        };
        let parts = form.parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name(), "text");
        assert_eq!(parts[0].size(), 3);
        assert_eq!(parts[1].filename(), Some("up.txt"));
        assert_eq!(parts[1].size(), 7);

        assert!(config(&["-F", "a=1", "-d", "b", "http://a.test/"]).is_err());
        assert!(matches!(
            config(&["-F", "a=@/nonexistent/file", "http://a.test/"]),
            Err(Error::Body(_))
        ));
    }

    #[test]
    fn test_cookies_and_referer() {
        let oc = config(&[
            "-b", "a=1; b=2",
            "-b", "cookies.txt",
            "-c", "out.txt",
            "-e", "http://from.test/;auto",
            "http://a.test/",
        ])
        .unwrap();
        assert_eq!(oc.cookies, ["a=1", "b=2"]);
        assert_eq!(oc.cookie_files, [PathBuf::from("cookies.txt")]);
        assert_eq!(oc.cookie_jar, Some(PathBuf::from("out.txt")));
        assert!(oc.auto_referer);
        assert_eq!(oc.referer.as_deref(), Some("http://from.test/"));
    }

    #[test]
    fn test_redirect_and_retry_options() {
        let oc = config(&[
            "-L",
            "--max-redirs", "-1",
            "--post302",
            "--proto-redir", "=https",
            "--retry", "3",
            "--retry-delay", "2",
            "--retry-max-time", "0.5",
            "--retry-connrefused",
            "http://a.test/",
        ])
        .unwrap();
        assert!(oc.redirect.follow);
        assert_eq!(oc.redirect.max_redirects, u32::MAX);
        assert!(oc.redirect.post302 && !oc.redirect.post301);
        assert_eq!(oc.redirect.allowed_protocols, ["https"]);
        assert_eq!(oc.retry.retries, 3);
        assert_eq!(oc.retry.delay, Some(Duration::from_secs(2)));
        assert_eq!(oc.retry.max_time, Some(Duration::from_millis(500)));
        assert!(oc.retry.connrefused);

        assert!(config(&["--proto-redir", "ftp", "http://a.test/"]).is_err());
    }

    #[test]
    fn test_outputs_pair_with_urls() {
        let oc = config(&["-o", "one", "-O", "http://a.test/x", "http://a.test/y"]).unwrap();
        assert_eq!(oc.requests[0].output, Some(PathBuf::from("one")));
        assert_eq!(oc.requests[1].output, None);
        assert!(oc.requests[1].remote_name);

        assert!(config(&["-o", "a", "-o", "b", "http://a.test/"]).is_err());
    }

    #[test]
    fn test_sizes_and_seconds() {
        assert_eq!(parse_size("500"), Ok(500));
        assert_eq!(parse_size("10K"), Ok(10 * 1024));
        assert_eq!(parse_size("2m"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Ok(1 << 30));
        assert!(parse_size("lots").is_err());

        assert_eq!(parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
        assert!(parse_seconds("-1").is_err());
    }

    #[test]
    fn test_tls_and_connect_options() {
        let oc = config(&[
            "-k",
            "--tlsv1.2",
            "--tls-max", "1.3",
            "--connect-timeout", "7",
            "--tcp-nodelay",
            "--no-keepalive",
            "-x", "socks5://proxy.test:1080",
            "https://a.test/",
        ])
        .unwrap();
        assert!(oc.tls.insecure);
        assert_eq!(oc.tls.min_version, Some(TlsVersion::Tls12));
        assert_eq!(oc.tls.max_version, Some(TlsVersion::Tls13));
        assert_eq!(oc.connect.connect_timeout, Duration::from_secs(7));
        assert!(oc.connect.tcp_nodelay);
        assert!(!oc.connect.keepalive);
        assert_eq!(oc.connect.proxy.as_ref().map(|u| u.scheme()), Some("socks5"));
    }

    #[test]
    fn test_log_filter() {
        let args = Args::try_parse_from(["vcurl", "-v", "a.test"]).unwrap();
        assert_eq!(args.log_filter(), "debug");
        let args = Args::try_parse_from(["vcurl", "-s", "a.test"]).unwrap();
        assert_eq!(args.log_filter(), "error");
        assert!(Args::try_parse_from(["vcurl", "-s", "-v", "a.test"]).is_err());
    }
}
