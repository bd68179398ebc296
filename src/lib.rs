//! vcurl - a blocking HTTP/1.1 command-line client
//!
//! The library holds the whole transfer engine; `src/main.rs` only parses
//! arguments and installs logging.
//!
//! Layers, bottom up:
//!
//! - [`http`]: headers, messages, the response parser and the session
//!   abstraction over plain TCP and TLS
//! - [`net`]: name resolution, TCP connect and proxy tunnels
//! - [`body`]: request body encoders (url-encoded and multipart)
//! - [`cookie`]: Set-Cookie parsing and the cookie jar
//! - [`request`], [`redirect`], [`output`]: building requests, following
//!   redirects and writing responses
//! - [`transfer`]: one logical operation, redirects included
//! - [`retry`]: re-running operations after transient failures
//! - [`app`]: a whole invocation over every requested URL
//!
//! # Examples
//!
//! ```no_run
//! use vcurl::config::{OperationConfig, RequestInfo};
//!
//! let mut config = OperationConfig::default();
//! config.requests.push(RequestInfo::new(vcurl::uri::parse("http://example.com/").unwrap()));
//! config.redirect.follow = true;
//! vcurl::app::run(&config).unwrap();
//! ```

pub mod app;
pub mod body;
pub mod cli;
pub mod config;
pub mod cookie;
pub mod error;
pub mod http;
pub mod net;
pub mod output;
pub mod redirect;
pub mod request;
pub mod retry;
pub mod transfer;
pub mod uri;

pub use error::{Category, Error, Result};
