//! Transport-facing request and response data.
//!
//! # Design
//! The library never opens a socket. It builds an `HttpRequest` as plain
//! data and hands it to an injected `Transport`, which performs the round
//! trip (TLS, proxying, timeouts) and returns the raw `HttpResponse`.
//! Keeping this boundary as plain owned data makes the pipeline
//! deterministic and lets tests substitute a closure for the network.

use std::fmt;

use crate::config::{Proxy, SslOptions};
use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request, ready for the transport.
///
/// Header names are lower-case. `url` carries no query string; use `uri()`
/// for the complete target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub ssl: SslOptions,
    pub proxy: Option<Proxy>,
}

impl HttpRequest {
    /// The request target including its query string.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(query) if self.url.contains('?') => format!("{}&{query}", self.url),
            Some(query) => format!("{}?{query}", self.url),
            None => self.url.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn uses_tls(&self) -> bool {
        self.url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }
}

/// A raw response as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Performs the network round trip for a built request.
///
/// Implementations report connection, TLS and timeout failures as
/// `TransportError`; those are returned to the caller unchanged.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, query: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            query: query.map(str::to_string),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: None,
            ssl: SslOptions::default(),
            proxy: None,
        }
    }

    #[test]
    fn uri_appends_query() {
        assert_eq!(request("http://a.io/x", Some("q=1")).uri(), "http://a.io/x?q=1");
        assert_eq!(request("http://a.io/x?p=0", Some("q=1")).uri(), "http://a.io/x?p=0&q=1");
        assert_eq!(request("http://a.io/x", None).uri(), "http://a.io/x");
    }

    #[test]
    fn header_lookup_ignores_case() {
        assert_eq!(request("http://a.io", None).header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn tls_follows_scheme() {
        assert!(request("HTTPS://a.io", None).uses_tls());
        assert!(!request("http://a.io", None).uses_tls());
    }

    #[test]
    fn closures_are_transports() {
        let transport = |req: &HttpRequest| {
            Ok::<_, TransportError>(HttpResponse {
                status: 204,
                headers: Vec::new(),
                body: req.method.as_str().as_bytes().to_vec(),
            })
        };
        let response = transport.send(&request("http://a.io", None)).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.body, b"GET".to_vec());
    }
}
