//! The request pipeline, one stage per type.
//!
//! # Design
//! A call moves through `Request` (built) → `ResolvedRequest` (options
//! merged) → `PreparedRequest` (body encoded) → `Response`. Every transition
//! takes `self` by value, so a stage can only be advanced once and a sent
//! request cannot be replayed. Nothing here performs I/O except
//! `PreparedRequest::send`, which calls the injected transport exactly once.

use tracing::{debug, warn};

use crate::body::Body;
use crate::config::{ClientConfig, StatusPolicy};
use crate::error::{ConfigError, Error, ResponseStatusError};
use crate::format::Format;
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::options::{self, is_absolute, RequestOptions, ResolvedOptions};
use crate::response::Response;

const CONTENT_TYPE: &str = "content-type";
const AUTHORIZATION: &str = "authorization";

/// A request as the caller described it.
#[derive(Debug)]
pub struct Request {
    method: HttpMethod,
    path: String,
    options: RequestOptions,
}

impl Request {
    pub fn new(method: HttpMethod, path: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.into(),
            options,
        }
    }

    /// Merge the call's options over the client defaults.
    pub fn resolve(self, defaults: &ClientConfig) -> Result<ResolvedRequest, Error> {
        let options = options::resolve(defaults, self.options)?;
        Ok(ResolvedRequest {
            method: self.method,
            path: self.path,
            options,
        })
    }
}

/// A request whose options are final.
#[derive(Debug)]
pub struct ResolvedRequest {
    method: HttpMethod,
    path: String,
    options: ResolvedOptions,
}

impl ResolvedRequest {
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Build the URL, query string, body and final headers.
    pub fn encode(self) -> Result<PreparedRequest, Error> {
        let ResolvedRequest {
            method,
            path,
            options,
        } = self;

        let url = join_url(options.base_uri.as_deref(), &path)?;
        let normalizer = options.query_string_normalizer.as_ref();

        let query = if options.query.is_empty() {
            None
        } else {
            let query = match normalizer {
                Some(normalize) => normalize(&options.query),
                None => options.query.to_query_string(),
            };
            Some(query).filter(|query| !query.is_empty())
        };

        let body = options
            .body
            .as_ref()
            .map(|payload| Body::encode(payload, options.multipart, normalizer))
            .transpose()?;

        let mut headers = options.headers;
        if let Some(body) = &body {
            match body.content_type() {
                Some(content_type) if body.is_multipart() => {
                    headers.insert(CONTENT_TYPE.to_string(), content_type);
                }
                Some(content_type) => {
                    headers.entry(CONTENT_TYPE.to_string()).or_insert(content_type);
                }
                None => {}
            }
        }
        if let Some(auth) = &options.basic_auth {
            headers.insert(AUTHORIZATION.to_string(), auth.header_value());
        }

        debug!(
            %method,
            %url,
            query = query.as_deref().unwrap_or(""),
            body = body.as_ref().map_or("none", Body::kind),
            "request encoded"
        );

        Ok(PreparedRequest {
            http: HttpRequest {
                method,
                url,
                query,
                headers: headers.into_iter().collect(),
                body: body.map(Body::into_bytes),
                ssl: options.ssl,
                proxy: options.proxy,
            },
            format: options.format,
            status_policy: options.status_policy,
        })
    }
}

/// A request ready for the transport, plus what is needed to read its answer.
#[derive(Debug)]
pub struct PreparedRequest {
    http: HttpRequest,
    format: Option<Format>,
    status_policy: StatusPolicy,
}

impl PreparedRequest {
    pub fn http(&self) -> &HttpRequest {
        &self.http
    }

    pub fn into_http(self) -> HttpRequest {
        self.http
    }

    /// Call the transport once and wrap what comes back.
    ///
    /// Transport failures are returned unchanged. Under
    /// `StatusPolicy::Raise` a 4xx/5xx becomes `Error::Status`, which still
    /// owns the complete response.
    pub fn send<T: Transport + ?Sized>(self, transport: &T) -> Result<Response, Error> {
        let PreparedRequest {
            http,
            format,
            status_policy,
        } = self;

        debug!(method = %http.method, uri = %http.uri(), "sending request");
        let raw = transport.send(&http)?;
        let response = Response::new(raw, format);
        debug!(
            status = response.status(),
            format = %response.format(),
            bytes = response.body().len(),
            "response received"
        );

        if response.is_error() {
            match status_policy {
                StatusPolicy::Raise => return Err(ResponseStatusError::new(response).into()),
                StatusPolicy::Advisory => {
                    warn!(status = response.status(), uri = %http.uri(), "server returned an error status");
                }
            }
        }
        Ok(response)
    }
}

/// Join a path onto the base URI. Absolute paths are used as given.
fn join_url(base_uri: Option<&str>, path: &str) -> Result<String, ConfigError> {
    if is_absolute(path) {
        return Ok(path.to_string());
    }
    let base = base_uri.ok_or_else(|| ConfigError::MissingBaseUri(path.to_string()))?;
    Ok(if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set_base_uri("api.example.com");
        config
    }

    fn prepare(config: &ClientConfig, method: HttpMethod, path: &str, options: RequestOptions) -> HttpRequest {
        Request::new(method, path, options)
            .resolve(config)
            .unwrap()
            .encode()
            .unwrap()
            .into_http()
    }

    #[test]
    fn paths_join_onto_base_uri() {
        assert_eq!(join_url(Some("http://a.io"), "/x").unwrap(), "http://a.io/x");
        assert_eq!(join_url(Some("http://a.io"), "x").unwrap(), "http://a.io/x");
        assert_eq!(join_url(Some("http://a.io"), "").unwrap(), "http://a.io");
        assert_eq!(join_url(None, "https://b.io/y").unwrap(), "https://b.io/y");
        assert_eq!(
            join_url(None, "/x").unwrap_err(),
            ConfigError::MissingBaseUri("/x".to_string())
        );
    }

    #[test]
    fn get_carries_merged_query() {
        let mut config = config();
        config.add_default_param("key", "k");
        let req = prepare(&config, HttpMethod::Get, "/search", RequestOptions::new().query_param("q", "a b"));
        assert_eq!(req.uri(), "http://api.example.com/search?key=k&q=a%20b");
        assert!(req.body.is_none());
    }

    #[test]
    fn form_body_sets_content_type_unless_given() {
        let form = Params::new().with("a", "text").with("b", "text2");
        let req = prepare(&config(), HttpMethod::Post, "/f", RequestOptions::new().body(form.clone()));
        assert_eq!(req.body.as_deref(), Some(&b"a=text&b=text2"[..]));
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));

        let options = RequestOptions::new().header("Content-Type", "text/plain").body(form);
        let req = prepare(&config(), HttpMethod::Post, "/f", options);
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn multipart_header_matches_body_boundary() {
        let options = RequestOptions::new().body(Params::new().with("field", "v")).multipart();
        let req = prepare(&config(), HttpMethod::Put, "/upload", options);
        let content_type = req.header("content-type").unwrap();
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();
        let expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nv\r\n--{boundary}--\r\n"
        );
        assert_eq!(req.body.unwrap(), expected.into_bytes());
    }

    #[test]
    fn raw_body_adds_no_content_type() {
        let req = prepare(&config(), HttpMethod::Post, "/raw", RequestOptions::new().body("{\"a\":1}"));
        assert_eq!(req.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn basic_auth_ssl_and_proxy_are_forwarded() {
        let mut config = config();
        config
            .set_basic_auth("user", "pass")
            .set_http_proxy("proxy.local", Some(3128))
            .set_ssl_ca_file("/etc/ssl/ca.pem");
        let req = prepare(&config, HttpMethod::Delete, "/x", RequestOptions::new().verify(false));
        assert_eq!(req.header("authorization"), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(req.proxy.as_ref().map(|p| p.port), Some(Some(3128)));
        assert_eq!(req.ssl.ca_file.as_deref(), Some(std::path::Path::new("/etc/ssl/ca.pem")));
        assert!(!req.ssl.verify);
    }

    #[test]
    fn normalizer_shapes_query_and_body() {
        let options = RequestOptions::new()
            .query_param("ids", vec![1, 2])
            .body(Params::new().with("tags", vec!["a", "b"]))
            .query_string_normalizer(|params: &Params| {
                params
                    .flatten()
                    .iter()
                    .map(|(key, leaf)| format!("{}={leaf:?}", key.trim_end_matches("[]")))
                    .collect::<Vec<_>>()
                    .join(";")
            });
        let req = prepare(&config(), HttpMethod::Post, "/n", options);
        assert_eq!(req.query.as_deref(), Some("ids=Text(\"1\");ids=Text(\"2\")"));
        assert_eq!(req.body.as_deref(), Some(&b"tags=Text(\"a\");tags=Text(\"b\")"[..]));
    }

    #[test]
    fn unreadable_file_aborts_before_sending() {
        let options = RequestOptions::new().body(Params::new().with("f", crate::body::FilePart::new("/no/such/file")));
        let err = Request::new(HttpMethod::Post, "/up", options)
            .resolve(&config())
            .unwrap()
            .encode()
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }
}
