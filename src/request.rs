//! Request builder
//!
//! Turns the operation configuration and a target URL into the request
//! head of the first hop. Redirect hops mutate this request in place.

use crate::config::OperationConfig;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, Method, Version};
use crate::uri;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("vcurl/", env!("CARGO_PKG_VERSION"));

/// Build the initial request for `url`
pub fn create_request(oc: &OperationConfig, url: &Url) -> Result<HttpRequest> {
    let credentials = uri::userinfo(url);
    if oc.disallow_username_in_url && credentials.is_some() {
        return Err(Error::CredentialsInUrl(uri::without_userinfo(url).to_string()));
    }

    let method = match &oc.method {
        Some(method) => method.clone(),
        None if oc.no_body => Method::Head,
        None => oc.body.method().unwrap_or(Method::Get),
    };
    let target = oc
        .request_target
        .clone()
        .unwrap_or_else(|| uri::request_target(url));

    let mut request = HttpRequest::new(method, target);
    if oc.http10 {
        request.set_version(Version::Http10);
    }

    let headers = request.headers_mut();
    headers.set("Host", uri::host_header(url));
    match oc.user_agent.as_deref() {
        Some("") => {}
        Some(agent) => headers.set("User-Agent", agent),
        None => headers.set("User-Agent", DEFAULT_USER_AGENT),
    }
    headers.set("Accept", "*/*");

    // An explicit range beats a resume offset
    if let Some(range) = &oc.range {
        headers.set("Range", format!("bytes={}", range));
    } else if let Some(offset) = oc.resume_from {
        headers.set("Range", format!("bytes={}-", offset));
    }

    if let Some(referer) = &oc.referer {
        headers.set("Referer", referer.as_str());
    }

    let userpwd = oc
        .userpwd
        .clone()
        .or_else(|| credentials.map(|(user, password)| format!("{}:{}", user, password)));
    if let Some(userpwd) = userpwd {
        headers.set("Authorization", format!("Basic {}", BASE64.encode(userpwd)));
    }

    if oc.compressed && cfg!(feature = "compression") {
        headers.set("Accept-Encoding", "gzip, deflate");
    }

    oc.body.set_headers(&mut request);

    let headers = request.headers_mut();
    for (name, value) in &oc.headers {
        headers.set(name.as_str(), value.as_str());
    }
    for name in &oc.omit_headers {
        headers.remove(name);
    }

    Ok(request)
}
