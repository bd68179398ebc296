//! Redirect and connection reuse resolution
//!
//! After every response the orchestrator asks [`RedirectContext::decide`]
//! whether to stop or follow, and on which connection. Following a hop
//! rewrites the request in place with [`RedirectContext::advance`].

use crate::config::RedirectPolicy;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, Method, ResponseHead};
use crate::uri;
use tracing::debug;
use url::Url;

/// What happens to the method on the next hop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodChange {
    Keep,
    /// Switch to GET and drop the body
    ToGet,
}

/// Outcome of examining a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// This response is the final one
    Done,
    Follow {
        url: Url,
        /// The current connection can carry the next request
        reuse: bool,
        method_change: MethodChange,
    },
}

/// How a redirect status affects the method, or `None` if it is not one
pub fn classify(status: u16, method: &Method, policy: &RedirectPolicy) -> Option<MethodChange> {
    let change = match status {
        301 => !policy.post301 && *method != Method::Get,
        302 => !policy.post302 && *method != Method::Get,
        303 => !policy.post303 && *method != Method::Get,
        307 | 308 => false,
        _ => return None,
    };

    Some(if change && *method != Method::Head {
        MethodChange::ToGet
    } else {
        MethodChange::Keep
    })
}

/// The connection to `current` can be reused for `next`
///
/// A body framed by connection close leaves nothing to reuse.
pub fn can_reuse_connection(
    current: &Url,
    next: &Url,
    head: &ResponseHead,
    head_request: bool,
) -> bool {
    head.keep_alive() && !head.delimited_by_close(head_request) && uri::same_origin(current, next)
}

/// Redirect state of one operation
#[derive(Debug, Clone)]
pub struct RedirectContext {
    original: Url,
    current: Url,
    remaining: u32,
    trusted: bool,
}

impl RedirectContext {
    pub fn new(url: Url, policy: &RedirectPolicy) -> Self {
        RedirectContext {
            original: url.clone(),
            current: url,
            remaining: policy.max_redirects,
            trusted: true,
        }
    }

    /// URL of the hop in flight
    pub fn current(&self) -> &Url {
        &self.current
    }

    /// The current hop may carry credentials and explicit cookies
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Decide whether `head` ends the operation
    pub fn decide(
        &mut self,
        policy: &RedirectPolicy,
        method: &Method,
        head: &ResponseHead,
    ) -> Result<Next> {
        if !policy.follow {
            return Ok(Next::Done);
        }
        let Some(method_change) = classify(head.status().code(), method, policy) else {
            return Ok(Next::Done);
        };
        let Some(location) = head.headers().get("Location") else {
            return Ok(Next::Done);
        };

        if self.remaining == 0 {
            return Err(Error::TooManyRedirects(policy.max_redirects));
        }

        let url = self
            .current
            .join(location.trim())
            .map_err(|_| Error::BadRedirect(location.to_string()))?;
        if !policy
            .allowed_protocols
            .iter()
            .any(|p| p.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(Error::UnsupportedProtocol(url.to_string()));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::BadRedirect(location.to_string()));
        }

        self.remaining -= 1;
        let reuse = can_reuse_connection(&self.current, &url, head, *method == Method::Head);
        debug!(
            "Redirect {} -> {} (reuse: {}, method: {:?})",
            self.current, url, reuse, method_change
        );

        Ok(Next::Follow {
            url,
            reuse,
            method_change,
        })
    }

    /// Rewrite `request` for the hop to `url`
    ///
    /// Returns false when the body must no longer be sent.
    pub fn advance(
        &mut self,
        request: &mut HttpRequest,
        url: Url,
        method_change: MethodChange,
        policy: &RedirectPolicy,
        auto_referer: bool,
        fixed_target: bool,
    ) -> bool {
        let mut keep_body = true;
        if method_change == MethodChange::ToGet {
            request.set_method(Method::Get);
            let headers = request.headers_mut();
            for name in ["Content-Length", "Content-Encoding", "Content-Type", "Expect"] {
                headers.remove(name);
            }
            keep_body = false;
        }

        if !fixed_target {
            request.set_target(uri::request_target(&url));
        }

        self.trusted = policy.unrestricted_auth || uri::same_origin(&self.original, &url);
        if !self.trusted {
            request.headers_mut().remove("Authorization");
        }

        if auto_referer {
            request
                .headers_mut()
                .set("Referer", uri::without_userinfo(&self.current).as_str());
        }
        request.headers_mut().set("Host", uri::host_header(&url));

        self.current = url;
        keep_body
    }
}
