//! Insertion-ordered cookie jar.
//!
//! # Design
//! Cookies are plain `name -> value` pairs. Re-adding a name overwrites its
//! value in place, so the serialized `cookie` header keeps the order in which
//! names were first seen. An empty jar serializes to an empty string and the
//! request pipeline never emits a header for it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered `name -> value` cookie store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: IndexMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `cookies` into the jar, overwriting existing names.
    pub fn add<I, K, V>(&mut self, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (name, value) in cookies {
            self.cookies.insert(name.into(), value.to_string());
        }
    }

    /// Merge every cookie of `other`, `other` winning on collisions.
    pub fn merge(&mut self, other: &CookieJar) {
        self.add(other.iter());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.cookies.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as a single `cookie` header value: `a=1; b=2`.
    pub fn to_cookie_string(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Add the leading `name=value` pair of a `set-cookie` header value.
    /// Attributes such as `Path` or `Expires` are ignored. Returns the
    /// cookie name when one was found.
    pub fn add_set_cookie(&mut self, header: &str) -> Option<String> {
        let (name, value) = parse_set_cookie(header)?;
        self.cookies.insert(name.clone(), value);
        Some(name)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for CookieJar {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut jar = CookieJar::new();
        jar.add(iter);
        jar
    }
}

/// Split the first `name=value` pair off a `set-cookie` header value.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
