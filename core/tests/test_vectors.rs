//! Verify request building and format resolution against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each request vector describes client defaults, one call's options and the
//! exact request the transport must receive. Building goes through
//! `Client::build_request`, so no transport is involved.

use serde_json::Value as Json;
use verbtide_core::{
    normalize_base_uri, Client, ClientConfig, Format, HttpMethod, HttpRequest, HttpResponse, Params,
    RequestOptions, TransportError,
};

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

/// Read `[["k", "v"], ...]` pairs, treating a missing key as empty.
fn pairs(value: &Json) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|pair| {
                    let arr = pair.as_array().unwrap();
                    (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn unreachable_transport(_: &HttpRequest) -> Result<HttpResponse, TransportError> {
    panic!("test vectors never send")
}

// ---------------------------------------------------------------------------
// Base URI
// ---------------------------------------------------------------------------

#[test]
fn base_uri_test_vectors() {
    let raw = include_str!("../../test-vectors/base_uri.json");
    let vectors: Json = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let expected = case["expected"].as_str().unwrap();

        let normalized = normalize_base_uri(input);
        assert_eq!(normalized, expected, "{name}");
        assert_eq!(normalize_base_uri(&normalized), normalized, "{name}: idempotent");
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[test]
fn content_type_test_vectors() {
    let raw = include_str!("../../test-vectors/content_types.json");
    let vectors: Json = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let content_type = case["content_type"].as_str().unwrap();
        let expected: Format = case["expected"].as_str().unwrap().parse().unwrap();
        assert_eq!(Format::from_content_type(content_type), expected, "{content_type:?}");
        assert_eq!(
            Format::resolve(Some(Format::Html), Some(content_type)),
            Format::Html,
            "{content_type:?}: explicit format wins"
        );
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Json = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let defaults = &case["defaults"];
        let call = &case["call"];
        let expected_req = &case["expected_request"];

        let mut config = ClientConfig::new();
        config.set_base_uri(defaults["base_uri"].as_str().unwrap());
        config.add_headers(pairs(&defaults["headers"])).unwrap();
        for (key, value) in pairs(&defaults["params"]) {
            config.add_default_param(key, value);
        }
        if defaults.get("cookies").is_some() {
            config.add_cookies(pairs(&defaults["cookies"])).unwrap();
        }
        let client = Client::new(config, unreachable_transport);

        let mut options = RequestOptions::new();
        for (key, value) in pairs(&call["headers"]) {
            options = options.header(key, value);
        }
        for (key, value) in pairs(&call["query"]) {
            options = options.query_param(key, value);
        }
        if call.get("cookies").is_some() {
            options = options.cookies(pairs(&call["cookies"]));
        }
        if call.get("form").is_some() {
            options = options.body(pairs(&call["form"]).into_iter().collect::<Params>());
        }
        if let Some(raw_body) = call["raw"].as_str() {
            options = options.body(raw_body);
        }

        let method = parse_method(call["method"].as_str().unwrap());
        let req = client
            .build_request(method, call["path"].as_str().unwrap(), options)
            .unwrap();

        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.uri(), expected_req["uri"].as_str().unwrap(), "{name}: uri");
        assert_eq!(req.headers, pairs(&expected_req["headers"]), "{name}: headers");
        assert_eq!(
            req.body.as_deref().map(|b| std::str::from_utf8(b).unwrap()),
            expected_req["body"].as_str(),
            "{name}: body"
        );
    }
}
