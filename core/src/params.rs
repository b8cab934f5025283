//! Parameter trees and their flattened form.
//!
//! # Design
//! Query strings and form bodies share one representation: an ordered map
//! whose values may be text, nested maps, lists or file-like values. Before
//! encoding, the tree is flattened into `(field name, leaf)` pairs using the
//! bracket notation most web frameworks decode:
//!
//! - `{user: {name: "a"}}` → `user[name]=a`
//! - `{ids: ["1", "2"]}` → `ids[]=1&ids[]=2`
//! - `{rows: [{id: "1"}]}` → `rows[][id]=1`
//!
//! Flattening is deterministic: pairs come out in insertion order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::body::{FileLike, FilePart, UploadedFile};

/// Unreserved characters (RFC 3986) stay literal, everything else is escaped.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Field names additionally keep their nesting brackets readable.
const FORM_KEY: &AsciiSet = &FORM_VALUE.remove(b'[').remove(b']');

/// A single parameter value.
#[derive(Clone)]
pub enum Value {
    Text(String),
    List(Vec<Value>),
    Map(Params),
    File(Arc<dyn FileLike>),
}

impl Value {
    pub fn is_file(&self) -> bool {
        matches!(self, Value::File(_))
    }

    /// True if this value is a file or holds one at any depth.
    pub fn contains_file(&self) -> bool {
        match self {
            Value::Text(_) => false,
            Value::File(_) => true,
            Value::List(items) => items.iter().any(Value::contains_file),
            Value::Map(params) => params.contains_file(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(params) => f.debug_tuple("Map").field(params).finish(),
            Value::File(file) => f.debug_tuple("File").field(&file.path()).finish(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

macro_rules! value_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Text(value.to_string())
                }
            }
        )*
    };
}

value_from_display!(bool, i32, i64, u16, u32, u64, usize, f64);

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Value::Map(params)
    }
}

impl From<Arc<dyn FileLike>> for Value {
    fn from(file: Arc<dyn FileLike>) -> Self {
        Value::File(file)
    }
}

impl From<FilePart> for Value {
    fn from(file: FilePart) -> Self {
        Value::File(Arc::new(file))
    }
}

impl From<UploadedFile> for Value {
    fn from(file: UploadedFile) -> Self {
        Value::File(Arc::new(file))
    }
}

/// An ordered parameter map.
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: IndexMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Overlay `other` key by key; `other` wins on collisions.
    pub fn merge(&mut self, other: &Params) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_file(&self) -> bool {
        self.entries.values().any(Value::contains_file)
    }

    /// Flatten into bracket-notation field names, in insertion order.
    pub fn flatten(&self) -> Vec<(String, Leaf<'_>)> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    /// Percent-encode into `a=1&b[c]=2` form.
    pub fn to_query_string(&self) -> String {
        self.flatten()
            .iter()
            .map(|(key, leaf)| {
                let value = match leaf {
                    Leaf::Text(text) => utf8_percent_encode(text, FORM_VALUE).to_string(),
                    Leaf::File(file) => utf8_percent_encode(&file.file_name(), FORM_VALUE).to_string(),
                };
                format!("{}={}", utf8_percent_encode(key, FORM_KEY), value)
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A flattened value: text, or a file to be streamed into a multipart part.
#[derive(Clone, Copy)]
pub enum Leaf<'a> {
    Text(&'a str),
    File(&'a dyn FileLike),
}

impl fmt::Debug for Leaf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Leaf::File(file) => f.debug_tuple("File").field(&file.file_name()).finish(),
        }
    }
}

fn flatten_into<'a>(key: String, value: &'a Value, out: &mut Vec<(String, Leaf<'a>)>) {
    match value {
        Value::Text(text) => out.push((key, Leaf::Text(text))),
        Value::File(file) => out.push((key, Leaf::File(file.as_ref()))),
        Value::Map(params) => {
            for (child, value) in &params.entries {
                flatten_into(format!("{key}[{child}]"), value, out);
            }
        }
        Value::List(items) if items.is_empty() => out.push((format!("{key}[]"), Leaf::Text(""))),
        Value::List(items) => {
            for item in items {
                flatten_into(format!("{key}[]"), item, out);
            }
        }
    }
}
