//! Response format resolution and body parsers.
//!
//! # Design
//! A response's format is decided once, from an explicitly configured format
//! or else from its `content-type` header, and then drives exactly one parser.
//! Unknown content types map to `Format::Plain`, whose parser hands the raw
//! bytes back untouched and cannot fail.
//!
//! XML is decoded into the same `serde_json::Value` tree JSON uses, so callers
//! walk either format the same way: elements become object keys, attributes
//! become sibling keys, repeated elements become arrays and text that shares
//! an element with attributes or children lands under `__content__`.

use std::fmt;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ParseError};

/// Key under which mixed text content of an XML element is stored.
pub const XML_CONTENT_KEY: &str = "__content__";

/// Content types with a dedicated parser.
const CONTENT_TYPES: &[(&str, Format)] = &[
    ("text/xml", Format::Xml),
    ("application/xml", Format::Xml),
    ("application/json", Format::Json),
    ("text/json", Format::Json),
    ("application/javascript", Format::Json),
    ("text/javascript", Format::Json),
    ("text/html", Format::Html),
];

/// The fixed set of body formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
    Html,
    /// No parsing: the raw body is returned unchanged.
    Plain,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Json, Format::Xml, Format::Html, Format::Plain];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Html => "html",
            Format::Plain => "plain",
        }
    }

    /// Map a `content-type` header value to a format, ignoring parameters
    /// such as `charset`.
    pub fn from_content_type(content_type: &str) -> Format {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        CONTENT_TYPES
            .iter()
            .find(|(known, _)| *known == mime)
            .map(|(_, format)| *format)
            .unwrap_or(Format::Plain)
    }

    /// An explicitly configured format always wins over the header.
    pub fn resolve(explicit: Option<Format>, content_type: Option<&str>) -> Format {
        match (explicit, content_type) {
            (Some(format), _) => format,
            (None, Some(content_type)) => Format::from_content_type(content_type),
            (None, None) => Format::Plain,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnsupportedFormat(s.to_string()))
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Json(Value),
    Xml(Value),
    /// HTML is not interpreted; the body bytes are kept as received.
    Html(Vec<u8>),
    Plain(Vec<u8>),
}

impl Parsed {
    /// The structured value for JSON and XML bodies.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Parsed::Json(value) | Parsed::Xml(value) => Some(value),
            Parsed::Html(_) | Parsed::Plain(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Parsed::Html(bytes) | Parsed::Plain(bytes) => Some(bytes),
            Parsed::Json(_) | Parsed::Xml(_) => None,
        }
    }
}

/// Run the parser selected by `format` over `body`.
pub fn parse(body: &[u8], format: Format) -> Result<Parsed, ParseError> {
    match format {
        Format::Json => parse_json(body).map(Parsed::Json),
        Format::Xml => parse_xml(body).map(Parsed::Xml),
        Format::Html => Ok(Parsed::Html(body.to_vec())),
        Format::Plain => Ok(Parsed::Plain(body.to_vec())),
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn parse_json(body: &[u8]) -> Result<Value, ParseError> {
    if is_blank(body) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ParseError::new(Format::Json, body, e))
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn start(tag: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attribute in tag.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| e.to_string())?;
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, Value) {
        let OpenElement {
            name,
            mut fields,
            text,
        } = self;
        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        } else {
            if !text.is_empty() {
                fields.insert(XML_CONTENT_KEY.to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (name, value)
    }
}

/// Repeated keys collapse into an array in document order.
fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        None => {
            fields.insert(name, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn parse_xml(body: &[u8]) -> Result<Value, ParseError> {
    if is_blank(body) {
        return Ok(Value::Null);
    }
    let fail = |cause: String| ParseError::new(Format::Xml, body, cause);
    let text = std::str::from_utf8(body).map_err(|e| fail(e.to_string()))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root = Map::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| fail(format!("{e} at position {}", reader.buffer_position())))?;
        if matches!(event, Event::Start(_) | Event::Empty(_)) && stack.is_empty() && !root.is_empty() {
            return Err(fail("more than one root element".to_string()));
        }
        match event {
            Event::Start(tag) => stack.push(OpenElement::start(&tag).map_err(&fail)?),
            Event::Empty(tag) => {
                let (name, value) = OpenElement::start(&tag).map_err(&fail)?.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| fail("unexpected closing tag".to_string()))?;
                let (name, value) = element.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Text(content) => {
                let content = content.unescape().map_err(|e| fail(e.to_string()))?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&content),
                    None => return Err(fail("text outside of the root element".to_string())),
                }
            }
            Event::CData(data) => {
                let data = data.into_inner();
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&String::from_utf8_lossy(&data)),
                    None => return Err(fail("CDATA outside of the root element".to_string())),
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(fail(format!("unclosed element <{}>", open.name)));
    }
    if root.is_empty() {
        return Err(fail("document has no root element".to_string()));
    }
    Ok(Value::Object(root))
}
