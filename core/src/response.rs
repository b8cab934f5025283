//! Responses with a lazily parsed body.
//!
//! # Design
//! Building a `Response` never parses. The format is fixed at construction
//! (explicit override, else `content-type`), and the first call to `parsed`
//! runs the matching parser and stores the outcome in a `OnceLock`. Later
//! calls, from any thread, see the same value or the same `ParseError`.

use std::borrow::Cow;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cookies::CookieJar;
use crate::error::{ParseError, ResponseStatusError};
use crate::format::{self, Format, Parsed};
use crate::http::HttpResponse;

/// A received response.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    format: Format,
    parsed: OnceLock<Result<Parsed, ParseError>>,
}

impl Response {
    /// Wrap a raw transport response, resolving its format.
    pub fn new(raw: HttpResponse, explicit_format: Option<Format>) -> Self {
        let content_type = find_header(&raw.headers, "content-type");
        let format = Format::resolve(explicit_format, content_type);
        Self {
            status: raw.status,
            headers: raw.headers,
            body: raw.body,
            format,
            parsed: OnceLock::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the body on first use; the outcome is cached.
    pub fn parsed(&self) -> Result<&Parsed, ParseError> {
        let outcome = self.parsed.get_or_init(|| {
            debug!(format = %self.format, bytes = self.body.len(), "parsing response body");
            format::parse(&self.body, self.format)
        });
        outcome.as_ref().map_err(Clone::clone)
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// Deserialize a JSON or XML body into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        let value = self.parsed()?.as_value().ok_or_else(|| {
            ParseError::new(self.format, &self.body, "body has no structured representation")
        })?;
        T::deserialize(value).map_err(|e| ParseError::new(self.format, &self.body, e))
    }

    /// Cookies set by the server through `set-cookie` headers.
    pub fn cookies(&self) -> CookieJar {
        let mut jar = CookieJar::new();
        for (_, value) in self.headers.iter().filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie")) {
            jar.add_set_cookie(value);
        }
        jar
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// Turn a 4xx/5xx response into an error that still owns it.
    pub fn error_for_status(self) -> Result<Self, ResponseStatusError> {
        if self.is_error() {
            Err(ResponseStatusError::new(self))
        } else {
            Ok(self)
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
