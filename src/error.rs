//! Crate-level error type
//!
//! Every layer has its own error enum; this one aggregates them together
//! with the failures the transfer logic itself raises. [`Error::category`]
//! is what the retry controller looks at.

use crate::{body, http, net, uri};
use std::io;
use std::path::PathBuf;

/// Coarse classification of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Could not reach or keep talking to the peer
    Connection,
    /// The peer sent something that is not valid HTTP
    Protocol,
    /// A timeout fired
    Cancelled,
    /// Invalid input or a policy decision (redirect limits, fail-fast)
    Application,
    /// A request body could not be produced
    Encoder,
    /// Output refused to protect the terminal
    OutputSafety,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Net(#[from] net::Error),

    #[error(transparent)]
    Http(#[from] http::Error),

    #[error(transparent)]
    Body(#[from] body::Error),

    #[error(transparent)]
    Url(#[from] uri::Error),

    #[error("TLS setup: {0}")]
    Tls(#[from] http::tls::TlsError),

    #[error("maximum ({0}) redirects followed")]
    TooManyRedirects(u32),

    #[error("protocol of redirect target {0} is not allowed")]
    UnsupportedProtocol(String),

    #[error("invalid redirect location: {0}")]
    BadRedirect(String),

    #[error("credentials in URL are not allowed: {0}")]
    CredentialsInUrl(String),

    #[error("the requested URL returned error: {0}")]
    HttpStatus(u16),

    #[error(
        "Binary output can mess up your terminal. Use \"--output -\" to tell \
         vcurl to output it to your terminal anyway, or consider \"--output \
         <FILE>\" to save to a file."
    )]
    BinaryOutput,

    #[error("failed writing {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode response body: {0}")]
    Decode(#[source] io::Error),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn category(&self) -> Category {
        match self {
            Error::Net(e) => match e {
                net::Error::Timeout(_) => Category::Cancelled,
                net::Error::Url(_) | net::Error::UnsupportedProxy(_) => Category::Application,
                _ => Category::Connection,
            },
            Error::Http(e) => http_category(e),
            Error::Body(_) => Category::Encoder,
            Error::Decode(_) => Category::Protocol,
            Error::BinaryOutput => Category::OutputSafety,
            Error::Url(_)
            | Error::Tls(_)
            | Error::TooManyRedirects(_)
            | Error::UnsupportedProtocol(_)
            | Error::BadRedirect(_)
            | Error::CredentialsInUrl(_)
            | Error::HttpStatus(_)
            | Error::Output { .. }
            | Error::Config(_) => Category::Application,
        }
    }

    /// The TCP connect was refused by the peer
    pub fn is_connection_refused(&self) -> bool {
        match self {
            Error::Net(e) => e.is_connection_refused(),
            _ => false,
        }
    }
}

fn http_category(e: &http::Error) -> Category {
    use http::Error as E;
    match e {
        E::Timeout => Category::Cancelled,
        E::Body(_) => Category::Encoder,
        E::BodyTooLarge(_) => Category::Application,
        E::Io(_) | E::Tls(_) | E::ConnectionClosed | E::Truncated => Category::Connection,
        E::Parse(_)
        | E::InvalidVersion(_)
        | E::InvalidMethod(_)
        | E::InvalidStatus(_)
        | E::InvalidHeader(_)
        | E::InvalidChunkSize(_)
        | E::Incomplete
        | E::Protocol(_) => Category::Protocol,
    }
}
