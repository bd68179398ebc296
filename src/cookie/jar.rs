//! Cookie storage and matching
//!
//! The jar is an ordered list keyed by `(name, domain, path)`. It is owned
//! by the caller and threaded through every request of an invocation; it is
//! loaded once at start and saved once at the end in the Netscape cookie
//! file format.

use super::{parse_set_cookie, Cookie, ParseError, SetCookie};
use chrono::{DateTime, TimeZone, Utc};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;
use url::Url;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// In-memory cookie jar
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Parse a `Set-Cookie` value received from `url` and store it
    ///
    /// Malformed values are skipped.
    pub fn add_from_header(&mut self, url: &Url, header: &str) {
        match parse_set_cookie(header) {
            Ok(cookie) => {
                self.add(url, cookie);
            }
            Err(e) => debug!("Ignoring Set-Cookie from {}: {}", url, e),
        }
    }

    /// Store a cookie received from `url`
    ///
    /// Returns false when the cookie was rejected or deleted.
    pub fn add(&mut self, url: &Url, cookie: SetCookie) -> bool {
        self.add_at(url, cookie, Utc::now())
    }

    pub fn add_at(&mut self, url: &Url, cookie: SetCookie, now: DateTime<Utc>) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let (domain, include_subdomains) = match cookie.domain {
            Some(ref domain) => {
                let allowed = if is_ip_literal(&host) {
                    *domain == host
                } else {
                    domain_match(&host, domain, true)
                };
                if !allowed {
                    debug!("Dropping cookie {}: domain {} does not match {}", cookie.name, domain, host);
                    return false;
                }
                (domain.clone(), true)
            }
            None => (host, false),
        };

        if cookie.secure && url.scheme() != "https" {
            debug!("Dropping secure cookie {} from {}", cookie.name, url);
            return false;
        }

        let expires = cookie.expiry_at(now);
        let stored = Cookie {
            path: cookie.path.clone().unwrap_or_else(|| default_path(url.path())),
            name: cookie.name,
            value: cookie.value,
            domain,
            expires,
            secure: cookie.secure,
            http_only: cookie.http_only,
            include_subdomains,
        };

        self.cookies.retain(|c| {
            !(c.name == stored.name && c.domain == stored.domain && c.path == stored.path)
        });

        // Checked after the removal so servers can delete cookies
        if stored.is_expired_at(now) {
            return false;
        }

        self.cookies.push(stored);
        true
    }

    /// Build the `Cookie` header value for a request to `url`
    pub fn make_field(&mut self, url: &Url) -> Option<String> {
        self.make_field_at(url, Utc::now())
    }

    pub fn make_field_at(&mut self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        self.cookies.retain(|c| !c.expires.is_some_and(|e| e <= now));

        let host = url.host_str()?.to_ascii_lowercase();
        let secure = url.scheme() == "https";

        let field = self
            .cookies
            .iter()
            .filter(|c| domain_match(&host, &c.domain, c.include_subdomains))
            .filter(|c| path_match(url.path(), &c.path))
            .filter(|c| !c.secure || secure)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        (!field.is_empty()).then_some(field)
    }

    /// Take over every cookie of `other`, replacing entries with the same key
    pub fn merge(&mut self, other: CookieJar) {
        for cookie in other.cookies {
            self.cookies.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            self.cookies.push(cookie);
        }
    }

    /// Drop every cookie without an expiry
    pub fn clear_session_cookies(&mut self) {
        self.cookies.retain(|c| !c.is_session());
    }

    /// Read a Netscape cookie file
    ///
    /// Comment lines and malformed lines are skipped.
    pub fn load(reader: impl BufRead) -> io::Result<Self> {
        let mut jar = CookieJar::new();
        for (index, line) in reader.lines().enumerate() {
            match parse_netscape_line(&line?, index + 1) {
                Ok(Some(cookie)) => jar.cookies.push(cookie),
                Ok(None) => {}
                Err(e) => debug!("{}", e),
            }
        }
        Ok(jar)
    }

    pub fn load_file(path: &Path) -> io::Result<Self> {
        CookieJar::load(BufReader::new(File::open(path)?))
    }

    /// Write the jar in Netscape cookie file format
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writeln!(writer, "{}", NETSCAPE_HEADER)?;
        writeln!(writer)?;
        for c in &self.cookies {
            let expires = c.expires.map_or(0, |e| e.timestamp().max(1));
            writeln!(
                writer,
                "{}{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
                if c.http_only { HTTP_ONLY_PREFIX } else { "" },
                if c.include_subdomains { "." } else { "" },
                c.domain,
                flag(c.include_subdomains),
                c.path,
                flag(c.secure),
                expires,
                c.name,
                c.value
            )?;
        }
        writer.flush()
    }

    pub fn save_file(&self, path: &Path) -> io::Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn parse_netscape_line(line: &str, number: usize) -> Result<Option<Cookie>, ParseError> {
    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None => (line, false),
    };
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let &[domain, subdomains, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(ParseError::JarLine(number));
    };

    let expires: i64 = expires.parse().map_err(|_| ParseError::JarLine(number))?;
    let expires = match expires {
        0 => None,
        seconds => Some(
            Utc.timestamp_opt(seconds, 0)
                .single()
                .ok_or(ParseError::JarLine(number))?,
        ),
    };

    if name.is_empty() || domain.is_empty() {
        return Err(ParseError::JarLine(number));
    }

    Ok(Some(Cookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: domain.trim_start_matches('.').to_ascii_lowercase(),
        path: path.to_string(),
        expires,
        secure: secure.eq_ignore_ascii_case("TRUE"),
        http_only,
        include_subdomains: subdomains.eq_ignore_ascii_case("TRUE") || domain.starts_with('.'),
    }))
}

fn is_ip_literal(host: &str) -> bool {
    host.starts_with('[') || host.parse::<IpAddr>().is_ok()
}

/// Match a request host against a cookie domain
fn domain_match(host: &str, domain: &str, include_subdomains: bool) -> bool {
    if host == domain {
        return true;
    }
    if !include_subdomains || is_ip_literal(host) {
        return false;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Match a request path against a cookie path
fn path_match(request: &str, cookie: &str) -> bool {
    if request.is_empty() {
        return true;
    }
    if !request.starts_with(cookie) {
        return false;
    }
    request.len() == cookie.len()
        || cookie.ends_with('/')
        || request.as_bytes()[cookie.len()] == b'/'
}

/// Directory of the request path
fn default_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(end) => path[..end].to_string(),
    }
}
