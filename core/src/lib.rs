//! Synchronous HTTP request building and response interpretation.
//!
//! # Overview
//! Layers configurable defaults over per-call options, encodes payloads as
//! URL-encoded forms or `multipart/form-data`, folds cookies into a single
//! header and picks a body parser from the response content type. The
//! network round trip is delegated to an injected [`Transport`]
//! (host-does-IO), so everything up to and after that call is deterministic.
//!
//! # Design
//! - `ClientConfig` is mutable during setup and frozen once a `Client` owns it.
//! - Each call flows `Request` → `ResolvedRequest` → `PreparedRequest` →
//!   `Response`; every step consumes the previous one.
//! - Response bodies are parsed lazily, at most once, on first access.
//! - 4xx/5xx handling is an explicit `StatusPolicy`, advisory by default.
//!
//! ```no_run
//! use verbtide_core::{Client, ClientConfig, HttpRequest, HttpResponse, Params, RequestOptions, TransportError};
//!
//! fn transport(req: &HttpRequest) -> Result<HttpResponse, TransportError> {
//!     # let _ = req;
//!     unimplemented!("perform the round trip with your HTTP stack")
//! }
//!
//! let mut config = ClientConfig::new();
//! config.set_base_uri("api.example.com").add_cookies([("session", "abc")])?;
//! let client = Client::new(config, transport);
//!
//! let form = Params::new().with("name", "Ada");
//! let response = client.post("/users", RequestOptions::new().body(form))?;
//! println!("{} {:?}", response.status(), response.parsed()?);
//! # Ok::<(), verbtide_core::Error>(())
//! ```

pub mod body;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod format;
pub mod http;
pub mod options;
pub mod params;
pub mod request;
pub mod response;

pub use body::{Body, FileLike, FilePart, Multipart, Part, Payload, QueryNormalizer, UploadedFile};
pub use client::Client;
pub use config::{BasicAuth, ClientConfig, Headers, Proxy, SslOptions, StatusPolicy};
pub use cookies::CookieJar;
pub use error::{ConfigError, EncodingError, Error, ParseError, ResponseStatusError, TransportError};
pub use format::{Format, Parsed};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use options::{normalize_base_uri, RequestOptions, ResolvedOptions};
pub use params::{Params, Value};
pub use request::{PreparedRequest, Request, ResolvedRequest};
pub use response::Response;
