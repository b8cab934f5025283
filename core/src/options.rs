//! Per-call options and their resolution against client defaults.
//!
//! # Design
//! `resolve` is a pure function of the client's `ClientConfig` and one call's
//! `RequestOptions`. Scalars are overridden wholesale; headers, query
//! parameters and cookies merge key by key with the call winning. Cookies
//! never reach the transport as an option: when either level carries any, a
//! jar is rebuilt for the call and folded into `headers["cookie"]`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::body::{Payload, QueryNormalizer};
use crate::config::{BasicAuth, ClientConfig, Headers, Proxy, SslOptions, StatusPolicy};
use crate::cookies::CookieJar;
use crate::error::ConfigError;
use crate::format::Format;
use crate::params::{Params, Value};

pub const COOKIE_HEADER: &str = "cookie";

/// Normalize a base URI: pick the scheme, drop trailing slashes.
///
/// TLS is assumed when the URI starts with `https://` or names port 443.
/// Normalizing an already normalized URI returns it unchanged.
pub fn normalize_base_uri(uri: &str) -> String {
    let uri = uri.trim_end_matches('/');
    let rest = strip_scheme(uri);
    let use_tls = has_prefix_ignore_case(uri, "https://") || authority(rest).ends_with(":443");
    let scheme = if use_tls { "https" } else { "http" };
    format!("{scheme}://{rest}")
}

/// The `host[:port]` part of a scheme-less URI.
fn authority(uri: &str) -> &str {
    let end = uri.find(['/', '?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Drop a leading `http://` or `https://`, in any letter case.
pub(crate) fn strip_scheme(uri: &str) -> &str {
    for scheme in ["http://", "https://"] {
        if has_prefix_ignore_case(uri, scheme) {
            return &uri[scheme.len()..];
        }
    }
    uri
}

pub(crate) fn is_absolute(uri: &str) -> bool {
    strip_scheme(uri).len() != uri.len()
}

/// Reject header names and values that would corrupt the request head.
pub fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if !name.bytes().all(is_token_byte) {
        return Err(invalid("name is not an HTTP token"));
    }
    if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(invalid("value contains a line break"));
    }
    Ok(())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Overrides for a single call. Unset fields fall back to the client config.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub(crate) base_uri: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) query: Option<Params>,
    pub(crate) cookies: Option<CookieJar>,
    pub(crate) basic_auth: Option<BasicAuth>,
    pub(crate) proxy: Option<Proxy>,
    pub(crate) format: Option<Format>,
    pub(crate) ssl_ca_file: Option<PathBuf>,
    pub(crate) ssl_ca_path: Option<PathBuf>,
    pub(crate) verify: Option<bool>,
    pub(crate) body: Option<Payload>,
    pub(crate) multipart: bool,
    pub(crate) query_string_normalizer: Option<QueryNormalizer>,
    pub(crate) status_policy: Option<StatusPolicy>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_uri(mut self, uri: &str) -> Self {
        self.base_uri = Some(normalize_base_uri(uri));
        self
    }

    /// Add a header. Validated when the request is resolved.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, params: Params) -> Self {
        self.query.get_or_insert_with(Params::new).merge(&params);
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.get_or_insert_with(Params::new).insert(key, value);
        self
    }

    pub fn cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.cookies.get_or_insert_with(CookieJar::new).add(cookies);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    pub fn http_proxy(mut self, addr: impl Into<String>, port: Option<u16>) -> Self {
        self.proxy = Some(Proxy::new(addr, port));
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn ssl_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_file = Some(path.into());
        self
    }

    pub fn ssl_ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_path = Some(path.into());
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    pub fn body(mut self, payload: impl Into<Payload>) -> Self {
        self.body = Some(payload.into());
        self
    }

    /// Force `multipart/form-data` even without file values.
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    pub fn query_string_normalizer<F>(mut self, normalizer: F) -> Self
    where
        F: Fn(&Params) -> String + Send + Sync + 'static,
    {
        self.query_string_normalizer = Some(Arc::new(normalizer));
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = Some(policy);
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("base_uri", &self.base_uri)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("cookies", &self.cookies)
            .field("format", &self.format)
            .field("body", &self.body)
            .field("multipart", &self.multipart)
            .finish_non_exhaustive()
    }
}

/// Options after merging one call over the client defaults.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub base_uri: Option<String>,
    pub headers: Headers,
    pub query: Params,
    pub basic_auth: Option<BasicAuth>,
    pub proxy: Option<Proxy>,
    pub format: Option<Format>,
    pub ssl: SslOptions,
    pub body: Option<Payload>,
    pub multipart: bool,
    pub query_string_normalizer: Option<QueryNormalizer>,
    pub status_policy: StatusPolicy,
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("base_uri", &self.base_uri)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("proxy", &self.proxy)
            .field("format", &self.format)
            .field("ssl", &self.ssl)
            .field("multipart", &self.multipart)
            .field("status_policy", &self.status_policy)
            .finish_non_exhaustive()
    }
}

/// Merge `overrides` over `defaults`. The defaults are never modified.
pub fn resolve(defaults: &ClientConfig, overrides: RequestOptions) -> Result<ResolvedOptions, ConfigError> {
    let mut headers = defaults.headers.clone();
    for (name, value) in &overrides.headers {
        validate_header(name, value)?;
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }

    if defaults.cookies.is_some() || overrides.cookies.is_some() {
        let mut jar = defaults.cookies.clone().unwrap_or_default();
        if let Some(call_cookies) = &overrides.cookies {
            jar.merge(call_cookies);
        }
        if jar.is_empty() {
            trace!("cookie jar is empty, no cookie header");
        } else {
            let cookie = jar.to_cookie_string();
            validate_header(COOKIE_HEADER, &cookie)?;
            trace!(cookies = jar.len(), "folding cookie jar into headers");
            headers.insert(COOKIE_HEADER.to_string(), cookie);
        }
    }

    let mut query = defaults.default_params.clone();
    if let Some(call_query) = &overrides.query {
        query.merge(call_query);
    }

    let mut ssl = defaults.ssl.clone();
    if let Some(ca_file) = overrides.ssl_ca_file {
        ssl.ca_file = Some(ca_file);
    }
    if let Some(ca_path) = overrides.ssl_ca_path {
        ssl.ca_path = Some(ca_path);
    }
    if let Some(verify) = overrides.verify {
        ssl.verify = verify;
    }

    Ok(ResolvedOptions {
        base_uri: overrides.base_uri.or_else(|| defaults.base_uri.clone()),
        headers,
        query,
        basic_auth: overrides.basic_auth.or_else(|| defaults.basic_auth.clone()),
        proxy: overrides.proxy.or_else(|| defaults.proxy.clone()),
        format: overrides.format.or(defaults.format),
        ssl,
        body: overrides.body,
        multipart: overrides.multipart,
        query_string_normalizer: overrides
            .query_string_normalizer
            .or_else(|| defaults.query_string_normalizer.clone()),
        status_policy: overrides.status_policy.unwrap_or(defaults.status_policy),
    })
}
