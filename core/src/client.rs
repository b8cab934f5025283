//! Request orchestration over an injected transport.
//!
//! # Design
//! `Client` pairs a frozen `ClientConfig` with a `Transport`. Each verb
//! method runs the full pipeline (resolve, encode, send, wrap) and owns
//! everything it creates; the only shared state is the read-only config, so
//! one client can serve many threads. Hosts that want to drive the network
//! themselves use `build_request` and `parse_response`, which never touch
//! the transport.

use std::sync::Arc;

use tracing::debug_span;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::options::RequestOptions;
use crate::request::Request;
use crate::response::Response;

/// Synchronous HTTP client with layered defaults.
#[derive(Debug, Clone)]
pub struct Client<T> {
    config: Arc<ClientConfig>,
    transport: T,
}

impl<T: Transport> Client<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// A client with empty defaults, for one-off requests to absolute URLs.
    pub fn with_transport(transport: T) -> Self {
        Self::new(ClientConfig::default(), transport)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a child configuration from this client's defaults.
    pub fn derive_config(&self) -> ClientConfig {
        self.config.derive()
    }

    pub fn get(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.perform(HttpMethod::Get, path, options)
    }

    pub fn post(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.perform(HttpMethod::Post, path, options)
    }

    pub fn put(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.perform(HttpMethod::Put, path, options)
    }

    pub fn delete(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.perform(HttpMethod::Delete, path, options)
    }

    pub fn perform(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<Response, Error> {
        let span = debug_span!("request", %method, path);
        let _guard = span.enter();
        Request::new(method, path, options)
            .resolve(&self.config)?
            .encode()?
            .send(&self.transport)
    }

    /// Build the transport request without sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpRequest, Error> {
        Ok(Request::new(method, path, options)
            .resolve(&self.config)?
            .encode()?
            .into_http())
    }

    /// Wrap a response obtained outside the client, using the configured format.
    pub fn parse_response(&self, response: HttpResponse) -> Response {
        Response::new(response, self.config.format())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::StatusPolicy;
    use crate::error::TransportError;
    use crate::format::{Format, Parsed};

    /// Records every request and answers with a canned response.
    #[derive(Debug)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
        reply: HttpResponse,
    }

    impl Recorder {
        fn replying(status: u16, content_type: &str, body: &str) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                reply: HttpResponse {
                    status,
                    headers: vec![("content-type".to_string(), content_type.to_string())],
                    body: body.as_bytes().to_vec(),
                },
            }
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for Recorder {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn client(recorder: Recorder) -> Client<Recorder> {
        let mut config = ClientConfig::new();
        config.set_base_uri("http://localhost:3000/");
        Client::new(config, recorder)
    }

    #[test]
    fn get_builds_correct_request() {
        let client = client(Recorder::replying(200, "application/json", "[]"));
        let response = client.get("/items", RequestOptions::new()).unwrap();
        let req = client.transport().last();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.uri(), "http://localhost:3000/items");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
        assert_eq!(response.parsed().unwrap(), &Parsed::Json(serde_json::json!([])));
    }

    #[test]
    fn each_verb_uses_its_method() {
        let client = client(Recorder::replying(204, "text/plain", ""));
        client.post("/a", RequestOptions::new()).unwrap();
        assert_eq!(client.transport().last().method, HttpMethod::Post);
        client.put("/a", RequestOptions::new()).unwrap();
        assert_eq!(client.transport().last().method, HttpMethod::Put);
        client.delete("/a", RequestOptions::new()).unwrap();
        assert_eq!(client.transport().last().method, HttpMethod::Delete);
    }

    #[test]
    fn cookies_are_sent_as_one_header() {
        let mut config = ClientConfig::new();
        config.set_base_uri("localhost").add_cookies([("session", "s1")]).unwrap();
        let client = Client::new(config, Recorder::replying(200, "text/plain", "ok"));

        client.get("/", RequestOptions::new().cookies([("theme", "dark")])).unwrap();
        let req = client.transport().last();
        let cookies: Vec<_> = req.headers.iter().filter(|(k, _)| k == "cookie").collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].1, "session=s1; theme=dark");

        client.get("/", RequestOptions::new()).unwrap();
        assert_eq!(client.transport().last().header("cookie"), Some("session=s1"));
    }

    #[test]
    fn advisory_policy_returns_error_responses() {
        let client = client(Recorder::replying(500, "application/json", r#"{"error":"boom"}"#));
        let response = client.get("/x", RequestOptions::new()).unwrap();
        assert!(response.is_server_error());
        assert!(response.error_for_status().is_err());
    }

    #[test]
    fn raise_policy_returns_status_error_with_response() {
        let client = client(Recorder::replying(404, "application/json", r#"{"error":"missing"}"#));
        let err = client
            .get("/x", RequestOptions::new().status_policy(StatusPolicy::Raise))
            .unwrap_err();
        match err {
            Error::Status(status) => {
                assert_eq!(status.status, 404);
                assert_eq!(status.response().format(), Format::Json);
                assert!(status.response().parsed().is_ok());
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn transport_errors_pass_through() {
        let failing = |_: &HttpRequest| Err::<HttpResponse, _>(TransportError::Connect("connection refused".to_string()));
        let client = Client::with_transport(failing);
        let err = client.get("http://127.0.0.1:9/", RequestOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Connect(ref msg)) if msg == "connection refused"));
    }

    #[test]
    fn configuration_errors_stop_before_sending() {
        let recorder = Recorder::replying(200, "text/plain", "");
        let client = Client::with_transport(recorder);
        let err = client.get("/relative", RequestOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(client.transport().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn build_and_parse_without_transport_io() {
        let recorder = Recorder::replying(200, "text/plain", "");
        let mut config = ClientConfig::new();
        config.set_base_uri("localhost:3000").set_format(Format::Json);
        let client = Client::new(config, recorder);

        let req = client.build_request(HttpMethod::Get, "items", RequestOptions::new()).unwrap();
        assert_eq!(req.uri(), "http://localhost:3000/items");
        assert!(client.transport().seen.lock().unwrap().is_empty());

        let response = client.parse_response(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: b"not json".to_vec(),
        });
        assert!(response.parsed().is_err());
    }

    #[test]
    fn derived_config_does_not_affect_parent_client() {
        let client = client(Recorder::replying(200, "text/plain", ""));
        let mut child = client.derive_config();
        child.add_header("x-child", "1").unwrap();
        assert!(client.config().headers().is_empty());
        assert_eq!(child.base_uri(), Some("http://localhost:3000"));
    }
}
