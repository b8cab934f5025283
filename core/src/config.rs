//! Client-level default configuration.
//!
//! # Design
//! A `ClientConfig` is assembled once, during setup, through `&mut self`
//! setters. Handing it to `Client::new` freezes it behind an `Arc`, after which
//! every request reads it without locking. A derived client starts from
//! `ClientConfig::derive`, a deep copy, so changing the child never leaks into
//! the parent.
//!
//! Fallible setters validate their whole input before touching any field, so
//! an error leaves the configuration exactly as it was.

use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::body::QueryNormalizer;
use crate::cookies::CookieJar;
use crate::error::ConfigError;
use crate::format::Format;
use crate::options::{normalize_base_uri, validate_header};
use crate::params::{Params, Value};

/// Request headers keyed by lower-case name.
pub type Headers = IndexMap<String, String>;

/// Credentials sent as an `authorization: Basic ...` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64.encode(credentials))
    }
}

/// HTTP proxy the transport should tunnel through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub addr: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Proxy {
    pub fn new(addr: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            addr: addr.into(),
            port,
        }
    }
}

/// TLS verification settings forwarded to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslOptions {
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
    #[serde(default = "verify_by_default")]
    pub verify: bool,
}

fn verify_by_default() -> bool {
    true
}

impl Default for SslOptions {
    fn default() -> Self {
        Self {
            ca_file: None,
            ca_path: None,
            verify: true,
        }
    }
}

/// What a 4xx/5xx response does to the call's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Return `Ok(Response)`; the caller decides via `error_for_status`.
    #[default]
    Advisory,
    /// Return `Err(Error::Status)`, which still owns the full response.
    Raise,
}

/// Defaults shared by every request a client issues.
#[derive(Clone, Default)]
pub struct ClientConfig {
    pub(crate) base_uri: Option<String>,
    pub(crate) headers: Headers,
    pub(crate) default_params: Params,
    pub(crate) cookies: Option<CookieJar>,
    pub(crate) basic_auth: Option<BasicAuth>,
    pub(crate) proxy: Option<Proxy>,
    pub(crate) format: Option<Format>,
    pub(crate) ssl: SslOptions,
    pub(crate) query_string_normalizer: Option<QueryNormalizer>,
    pub(crate) status_policy: StatusPolicy,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a child configuration from an independent copy of this one.
    pub fn derive(&self) -> Self {
        self.clone()
    }

    pub fn set_base_uri(&mut self, uri: &str) -> &mut Self {
        self.base_uri = Some(normalize_base_uri(uri));
        self
    }

    pub fn set_http_proxy(&mut self, addr: impl Into<String>, port: Option<u16>) -> &mut Self {
        self.proxy = Some(Proxy::new(addr, port));
        self
    }

    pub fn set_basic_auth(&mut self, username: impl Into<String>, password: impl Into<String>) -> &mut Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    /// Merge query parameters sent with every request.
    pub fn add_default_params(&mut self, params: &Params) -> &mut Self {
        self.default_params.merge(params);
        self
    }

    pub fn add_default_param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.default_params.insert(key, value);
        self
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<&mut Self, ConfigError> {
        validate_header(name, value)?;
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(self)
    }

    /// Merge several headers; nothing is applied if any of them is invalid.
    pub fn add_headers<I, K, V>(&mut self, headers: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut accepted = Vec::new();
        for (name, value) in headers {
            let (name, value) = (name.as_ref(), value.as_ref());
            validate_header(name, value)?;
            accepted.push((name.to_ascii_lowercase(), value.to_string()));
        }
        self.headers.extend(accepted);
        Ok(self)
    }

    /// Merge cookies sent with every request; nothing is applied if any
    /// name is not a token or any value contains a line break.
    pub fn add_cookies<I, K, V>(&mut self, cookies: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let mut accepted = Vec::new();
        for (name, value) in cookies {
            let (name, value) = (name.into(), value.to_string());
            validate_header(&name, &value)?;
            accepted.push((name, value));
        }
        self.cookies.get_or_insert_with(CookieJar::new).add(accepted);
        Ok(self)
    }

    pub fn set_format(&mut self, format: Format) -> &mut Self {
        self.format = Some(format);
        self
    }

    /// Set the format by name, rejecting names outside the enumerated set.
    pub fn set_format_name(&mut self, name: &str) -> Result<&mut Self, ConfigError> {
        let format = name.parse::<Format>()?;
        Ok(self.set_format(format))
    }

    pub fn set_ssl_ca_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.ssl.ca_file = Some(path.into());
        self
    }

    pub fn set_ssl_ca_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.ssl.ca_path = Some(path.into());
        self
    }

    pub fn set_verify(&mut self, verify: bool) -> &mut Self {
        self.ssl.verify = verify;
        self
    }

    pub fn set_query_string_normalizer<F>(&mut self, normalizer: F) -> &mut Self
    where
        F: Fn(&Params) -> String + Send + Sync + 'static,
    {
        self.query_string_normalizer = Some(std::sync::Arc::new(normalizer));
        self
    }

    pub fn set_status_policy(&mut self, policy: StatusPolicy) -> &mut Self {
        self.status_policy = policy;
        self
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn default_params(&self) -> &Params {
        &self.default_params
    }

    pub fn cookies(&self) -> Option<&CookieJar> {
        self.cookies.as_ref()
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn format(&self) -> Option<Format> {
        self.format
    }

    pub fn ssl(&self) -> &SslOptions {
        &self.ssl
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.status_policy
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_uri", &self.base_uri)
            .field("headers", &self.headers)
            .field("default_params", &self.default_params)
            .field("cookies", &self.cookies)
            .field("basic_auth", &self.basic_auth.as_ref().map(|auth| &auth.username))
            .field("proxy", &self.proxy)
            .field("format", &self.format)
            .field("ssl", &self.ssl)
            .field("query_string_normalizer", &self.query_string_normalizer.is_some())
            .field("status_policy", &self.status_policy)
            .finish()
    }
}
