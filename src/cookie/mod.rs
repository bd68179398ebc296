//! HTTP cookies
//!
//! `Set-Cookie` parsing lives here; storage, matching and persistence are in
//! [`jar`]. Attribute handling follows what a command-line client needs:
//! expiry (`Expires` / `Max-Age`), `Domain`, `Path`, `Secure`, `HttpOnly`,
//! `SameSite` and the `__Secure-` / `__Host-` name prefixes.

pub mod jar;

pub use jar::CookieJar;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Cookie parse errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing cookie name")]
    MissingName,

    #[error("invalid character in cookie {0}")]
    InvalidChar(&'static str),

    #[error("attribute {0} requires a value")]
    MissingValue(String),

    #[error("invalid {attribute} value: {value}")]
    InvalidValue { attribute: String, value: String },

    #[error("cookie {0} violates its name prefix requirements")]
    Prefix(String),

    #[error("malformed cookie file line {0}")]
    JarLine(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A stored cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host or domain, lowercase, without a leading dot
    pub domain: String,
    pub path: String,
    /// `None` for session cookies
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    /// False for host-only cookies
    pub include_subdomains: bool,
}

impl Cookie {
    /// Lives only for the current session
    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires < now)
    }
}

/// A parsed `Set-Cookie` header before it is bound to a request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub partitioned: bool,
}

impl SetCookie {
    /// Absolute expiry; `Max-Age` wins over `Expires`
    pub fn expiry_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.max_age {
            Some(seconds) if seconds <= 0 => Some(DateTime::<Utc>::MIN_UTC),
            Some(seconds) => Some(
                Duration::try_seconds(seconds)
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            None => self.expires,
        }
    }
}

fn is_name_char(c: char) -> bool {
    c > ' ' && c != '\x7f' && !"()<>@,;:\\\"/[]?={}".contains(c)
}

fn is_value_char(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x2b' | '\x2d'..='\x3a' | '\x3c'..='\x5b' | '\x5d'..='\x7e')
}

/// Parse one `Set-Cookie` header value
pub fn parse_set_cookie(header: &str) -> Result<SetCookie, ParseError> {
    let mut pieces = header.split(';');
    let pair = pieces.next().unwrap_or_default();

    let (name, value) = pair.split_once('=').ok_or(ParseError::MissingName)?;
    let name = name.trim();
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    if name.is_empty() {
        return Err(ParseError::MissingName);
    }
    if !name.chars().all(is_name_char) {
        return Err(ParseError::InvalidChar("name"));
    }
    if !value.chars().all(is_value_char) {
        return Err(ParseError::InvalidChar("value"));
    }

    let mut cookie = SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        expires: None,
        max_age: None,
        domain: None,
        path: None,
        secure: false,
        http_only: false,
        same_site: None,
        partitioned: false,
    };

    for attr in pieces {
        let (attr_name, attr_value) = match attr.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim())),
            None => (attr.trim(), None),
        };
        let required = || attr_value.ok_or_else(|| ParseError::MissingValue(attr_name.to_string()));
        let invalid = |value: &str| ParseError::InvalidValue {
            attribute: attr_name.to_string(),
            value: value.to_string(),
        };

        match attr_name.to_ascii_lowercase().as_str() {
            "expires" => {
                let value = required()?;
                // Unparseable dates leave the cookie a session cookie
                cookie.expires = parse_cookie_date(value);
            }
            "max-age" => {
                let value = required()?;
                cookie.max_age = Some(value.parse().map_err(|_| invalid(value))?);
            }
            "domain" => {
                let value = required()?;
                let domain = value.trim_start_matches('.').to_ascii_lowercase();
                if !domain.is_empty() {
                    cookie.domain = Some(domain);
                }
            }
            "path" => {
                let value = required()?;
                if value.starts_with('/') {
                    cookie.path = Some(value.to_string());
                }
            }
            "samesite" => {
                let value = attr_value.unwrap_or_default();
                cookie.same_site = Some(match value.to_ascii_lowercase().as_str() {
                    "strict" => SameSite::Strict,
                    "lax" => SameSite::Lax,
                    "none" => SameSite::None,
                    _ => return Err(invalid(value)),
                });
            }
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "partitioned" => cookie.partitioned = true,
            _ => {}
        }
    }

    if cookie.name.starts_with("__Secure-") && !cookie.secure {
        return Err(ParseError::Prefix(cookie.name));
    }
    if cookie.name.starts_with("__Host-")
        && (!cookie.secure || cookie.path.as_deref() != Some("/") || cookie.domain.is_some())
    {
        return Err(ParseError::Prefix(cookie.name));
    }

    Ok(cookie)
}

/// Parse the date forms servers send in `Expires`
pub fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }

    const FORMATS: [&str; 3] = [
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a, %d %b %Y %H:%M:%S GMT",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
