//! Operation configuration
//!
//! [`OperationConfig`] carries every option of one invocation. It is built
//! by the command-line layer and read (never mutated) by the transfer
//! engine. `Default` gives the same behavior as running with no options.

use crate::body::Body;
use crate::http::tls::{TlsConfig, TlsError, TlsVersion};
use crate::http::Method;
use crate::net::ConnectOptions;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Redirect handling
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    /// Follow `Location` at all
    pub follow: bool,
    pub max_redirects: u32,
    /// Keep POST on a 301
    pub post301: bool,
    /// Keep POST on a 302
    pub post302: bool,
    /// Keep the method on a 303
    pub post303: bool,
    /// Send credentials to every host redirected to
    pub unrestricted_auth: bool,
    /// Schemes a redirect may switch to
    pub allowed_protocols: Vec<String>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy {
            follow: false,
            max_redirects: 50,
            post301: false,
            post302: false,
            post303: false,
            unrestricted_auth: false,
            allowed_protocols: vec!["http".to_string(), "https".to_string()],
        }
    }
}

/// Retry behavior
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Fixed wait between attempts; exponential backoff when unset
    pub delay: Option<Duration>,
    /// No retry starts after this much time has passed
    pub max_time: Option<Duration>,
    /// Also retry refused connections
    pub connrefused: bool,
    /// Retry every failure except application errors
    pub all_errors: bool,
}

/// TLS options
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub insecure: bool,
    pub ca_file: Option<PathBuf>,
    pub min_version: Option<TlsVersion>,
    pub max_version: Option<TlsVersion>,
    pub ciphers: Option<String>,
}

impl TlsOptions {
    /// Build the client context shared by every connection of the run
    pub fn build(&self) -> Result<TlsConfig, TlsError> {
        let mut builder = TlsConfig::client()?
            .version_range(self.min_version, self.max_version)?
            .alpn(&["http/1.1"])?
            .verify_peer(!self.insecure);
        if let Some(ciphers) = &self.ciphers {
            builder = builder.cipher_list(ciphers)?;
        }
        if let Some(path) = &self.ca_file {
            builder = builder.ca_file(path)?;
        }
        Ok(builder.build())
    }
}

/// One URL of the invocation and where its body goes
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub url: Url,
    /// Explicit output file; `-` is stdout
    pub output: Option<PathBuf>,
    /// Name the output after the last URL path segment
    pub remote_name: bool,
}

impl RequestInfo {
    pub fn new(url: Url) -> Self {
        RequestInfo {
            url,
            output: None,
            remote_name: false,
        }
    }
}

/// Options for a whole invocation
#[derive(Debug, Clone, Default)]
pub struct OperationConfig {
    pub requests: Vec<RequestInfo>,

    // Request
    /// Explicit method, sent on every hop unless a redirect changes it
    pub method: Option<Method>,
    /// Send HEAD
    pub no_body: bool,
    pub http10: bool,
    pub request_target: Option<String>,
    /// `None` sends the default user agent
    pub user_agent: Option<String>,
    /// Added or replaced headers
    pub headers: Vec<(String, String)>,
    /// Headers removed from the request
    pub omit_headers: Vec<String>,
    pub referer: Option<String>,
    pub auto_referer: bool,
    /// `user:password` for Basic authentication
    pub userpwd: Option<String>,
    pub range: Option<String>,
    pub resume_from: Option<u64>,
    pub compressed: bool,
    pub body: Body,
    /// Encoded data appended to the URL query instead of being sent
    pub query: Option<String>,
    pub disallow_username_in_url: bool,

    // Transfer
    pub redirect: RedirectPolicy,
    pub retry: RetryPolicy,
    pub max_time: Option<Duration>,
    pub connect: ConnectOptions,
    pub tls: TlsOptions,
    pub max_filesize: Option<u64>,
    pub limit_rate: Option<u64>,

    // Response handling
    pub fail_on_error: bool,
    pub fail_with_body: bool,
    pub show_headers: bool,
    /// `-` is stdout
    pub dump_header: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub create_dirs: bool,
    pub remove_on_error: bool,
    pub content_disposition: bool,

    // Cookies
    /// `name=value` pairs sent as given
    pub cookies: Vec<String>,
    /// Netscape cookie files read at start
    pub cookie_files: Vec<PathBuf>,
    /// File the jar is written to at the end
    pub cookie_jar: Option<PathBuf>,
    pub junk_session_cookies: bool,
}

impl OperationConfig {
    /// Cookies are tracked across responses
    pub fn cookie_engine(&self) -> bool {
        !self.cookie_files.is_empty() || self.cookie_jar.is_some()
    }
}
