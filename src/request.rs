//! Request descriptor and builder
//!
//! A `RequestDescriptor` is the immutable specification of one request to
//! execute: destination, headers, optional body, cache flags, and
//! timeouts. It is assembled through `DescriptorBuilder` and cannot be
//! reconfigured once built; executors only read it.

use std::time::Duration;

use crate::error::Error;

/// Default cache time-to-live (just under fifteen minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(899_999);

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable specification of one request
#[derive(Debug, Clone)]
pub struct RequestDescriptor<T = ()> {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<T>,
    pub(crate) bodyless: bool,
    pub(crate) cache_enabled: bool,
    pub(crate) automatic_cache_refresh: bool,
    pub(crate) reprocess_when_refreshing: bool,
    pub(crate) cache_ttl: Duration,
    pub(crate) timeout: Duration,

    // Destination parts, split once at build time for fingerprinting
    pub(crate) authority: String,
    pub(crate) path: String,
    pub(crate) query: String,
}

impl<T> RequestDescriptor<T> {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The final URL, query string included
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for `RequestDescriptor`
///
/// Setters chain; `build` validates the URL and freezes the value.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder<T = ()> {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<T>,
    bodyless: bool,
    cache_enabled: bool,
    automatic_cache_refresh: bool,
    reprocess_when_refreshing: bool,
    cache_ttl: Duration,
    timeout: Duration,
}

impl<T> DescriptorBuilder<T> {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: None,
            bodyless: false,
            cache_enabled: true,
            automatic_cache_refresh: false,
            reprocess_when_refreshing: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append one query parameter. Spaces in the value are carried as `+`.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append one request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the full header set
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    /// When set, the request is sent without a body even if one was
    /// configured
    pub fn bodyless(mut self, bodyless: bool) -> Self {
        self.bodyless = bodyless;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Re-fetch in the background after a cache hit is served
    pub fn automatic_cache_refresh(mut self, enabled: bool) -> Self {
        self.automatic_cache_refresh = enabled;
        self
    }

    /// Run the outcome handlers again when the background refresh lands
    pub fn reprocess_when_refreshing(mut self, enabled: bool) -> Self {
        self.reprocess_when_refreshing = enabled;
        self
    }

    /// Validate the destination and freeze the descriptor
    pub fn build(self) -> Result<RequestDescriptor<T>, Error> {
        let url = assemble_url(&self.url, &self.query);

        let parsed =
            reqwest::Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        let authority = parsed.authority().to_string();
        if authority.is_empty() {
            return Err(Error::InvalidUrl(format!("{}: missing authority", url)));
        }

        Ok(RequestDescriptor {
            method: self.method,
            headers: self.headers,
            body: self.body,
            bodyless: self.bodyless,
            cache_enabled: self.cache_enabled,
            automatic_cache_refresh: self.automatic_cache_refresh,
            reprocess_when_refreshing: self.reprocess_when_refreshing,
            cache_ttl: self.cache_ttl,
            timeout: self.timeout,
            authority,
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or("").to_string(),
            url,
        })
    }
}

fn assemble_url(base: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return base.to_string();
    }

    let mut url = String::from(base);
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in query {
        url.push(separator);
        url.push_str(key);
        url.push('=');
        url.push_str(&value.replace(' ', "+"));
        separator = '&';
    }
    url
}

/// Short name of a type, for cache namespacing
pub(crate) fn type_tag<X>() -> &'static str {
    let full = std::any::type_name::<X>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Whether `X` is the empty/void response type
pub(crate) fn is_void<X: 'static>() -> bool {
    std::any::TypeId::of::<X>() == std::any::TypeId::of::<()>()
}
