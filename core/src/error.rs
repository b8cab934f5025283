//! Error types for the request pipeline.
//!
//! # Design
//! Each pipeline stage owns one error type so callers can tell *where* a call
//! failed: configuration problems surface before anything is sent, encoding
//! problems abort the request before the transport runs, transport failures
//! pass through untouched, and parse failures only appear when the parsed
//! body is actually requested. `Error` wraps them all for `?` propagation.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::format::Format;
use crate::response::Response;

/// Any failure produced by a `Client` call.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Status(#[from] ResponseStatusError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Invalid configuration, rejected at setup time or before a request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The format name is not one of the enumerated formats.
    #[error("unsupported format `{0}`, must be one of: json, xml, html, plain")]
    UnsupportedFormat(String),

    /// A header name or value would corrupt the request head.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    /// A relative path was requested but neither the client nor the call
    /// configured a base URI.
    #[error("cannot resolve relative path `{0}` without a base URI")]
    MissingBaseUri(String),
}

/// The request body could not be assembled.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A file-like value could not be read.
    #[error("failed to read file part `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Failure reported by the injected transport. Never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport error: {0}")]
    Other(String),
}

/// The server answered with a 4xx or 5xx status.
///
/// The complete `Response` is kept so the caller can still inspect headers
/// and body, including the lazily parsed body.
#[derive(Debug, Error)]
#[error("HTTP {status}")]
pub struct ResponseStatusError {
    pub status: u16,
    response: Box<Response>,
}

impl ResponseStatusError {
    pub(crate) fn new(response: Response) -> Self {
        Self {
            status: response.status(),
            response: Box::new(response),
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(self) -> Response {
        *self.response
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// A response body did not decode under its resolved format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse {format} body: {cause}")]
pub struct ParseError {
    pub format: Format,
    pub body: Vec<u8>,
    pub cause: String,
}

impl ParseError {
    pub(crate) fn new(format: Format, body: &[u8], cause: impl fmt::Display) -> Self {
        Self {
            format,
            body: body.to_vec(),
            cause: cause.to_string(),
        }
    }

    /// The raw body as text, for diagnostics.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_allowed_formats() {
        let err = ConfigError::UnsupportedFormat("yaml".to_string());
        assert_eq!(
            err.to_string(),
            "unsupported format `yaml`, must be one of: json, xml, html, plain"
        );
    }

    #[test]
    fn parse_error_keeps_raw_body() {
        let err = ParseError::new(Format::Json, b"{oops", "expected value");
        assert_eq!(err.body_text(), "{oops");
        assert_eq!(err.to_string(), "failed to parse json body: expected value");
    }

    #[test]
    fn transport_error_passes_through_transparently() {
        let err: Error = TransportError::Timeout.into();
        assert_eq!(err.to_string(), "request timed out");
        assert!(matches!(err, Error::Transport(TransportError::Timeout)));
    }
}
