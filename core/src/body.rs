//! Request body encoding.
//!
//! # Design
//! A payload is either raw bytes, passed through untouched, or a parameter
//! tree. Parameter trees become `multipart/form-data` when the caller asks
//! for it or when any leaf is file-like; otherwise they are URL-encoded,
//! optionally through a caller-supplied normalizer.
//!
//! File-like values are anything implementing `FileLike`. Their bytes are
//! read while the body is assembled, so an unreadable file aborts the request
//! before the transport is ever called.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::EncodingError;
use crate::params::{Leaf, Params};

/// Content type attached to every file part.
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Turns a parameter tree into a query string or form body.
pub type QueryNormalizer = Arc<dyn Fn(&Params) -> String + Send + Sync>;

/// Capability of a value that can be uploaded as a file part.
pub trait FileLike: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    /// Name reported by an upload wrapper, preferred over the path's base name.
    fn original_filename(&self) -> Option<&str> {
        None
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>>;

    /// The `filename` advertised in the part's disposition header.
    fn file_name(&self) -> String {
        match self.original_filename() {
            Some(name) => name.to_string(),
            None => self
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// A file on disk, read when the body is encoded.
#[derive(Debug, Clone)]
pub struct FilePart {
    path: PathBuf,
}

impl FilePart {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileLike for FilePart {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// An in-memory upload, such as a file received by a web handler.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    path: PathBuf,
    original_filename: Option<String>,
    data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            original_filename: None,
            data,
        }
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }
}

impl FileLike for UploadedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// What the caller wants to send.
#[derive(Debug, Clone)]
pub enum Payload {
    Raw(Vec<u8>),
    Params(Params),
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Raw(value.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Raw(value.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Raw(value)
    }
}

impl From<Params> for Payload {
    fn from(value: Params) -> Self {
        Payload::Params(value)
    }
}

/// One `form-data` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    fn write_to(&self, boundary: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let name = escape_disposition(&self.name);
        out.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"").as_bytes());
        if let Some(filename) = &self.filename {
            let filename = escape_disposition(filename);
            out.extend_from_slice(format!("; filename=\"{filename}\"").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if let Some(content_type) = &self.content_type {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.data);
        out.extend_from_slice(b"\r\n");
    }
}

/// Quote-safe `Content-Disposition` parameter value, escaped the way
/// browsers encode form field names: `"`, CR and LF become `%22`, `%0D`, `%0A`.
fn escape_disposition(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A `multipart/form-data` body and the boundary separating its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Multipart {
    /// Build one part per flattened leaf of `params`.
    pub fn from_params(params: &Params, boundary: impl Into<String>) -> Result<Self, EncodingError> {
        let parts = params
            .flatten()
            .into_iter()
            .map(|(name, leaf)| match leaf {
                Leaf::Text(text) => Ok(Part {
                    name,
                    filename: None,
                    content_type: None,
                    data: text.as_bytes().to_vec(),
                }),
                Leaf::File(file) => match file.read_bytes() {
                    Ok(data) => Ok(Part {
                        name,
                        filename: Some(file.file_name()),
                        content_type: Some(FILE_CONTENT_TYPE.to_string()),
                        data,
                    }),
                    Err(source) => Err(EncodingError::Io { name, source }),
                },
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        Ok(Self {
            boundary: boundary.into(),
            parts,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            part.write_to(&self.boundary, &mut out);
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

/// A fresh, unpredictable multipart boundary.
pub fn generate_boundary() -> String {
    format!("------------------------{}", Uuid::new_v4().simple())
}

/// An encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Raw(Vec<u8>),
    UrlEncoded(String),
    Multipart(Multipart),
}

impl Body {
    /// Encode `payload`, generating a new boundary if it turns out multipart.
    pub fn encode(
        payload: &Payload,
        multipart: bool,
        normalizer: Option<&QueryNormalizer>,
    ) -> Result<Body, EncodingError> {
        match payload {
            Payload::Raw(bytes) => Ok(Body::Raw(bytes.clone())),
            Payload::Params(params) if multipart || params.contains_file() => {
                Multipart::from_params(params, generate_boundary()).map(Body::Multipart)
            }
            Payload::Params(params) => Ok(Body::UrlEncoded(match normalizer {
                Some(normalize) => normalize(params),
                None => params.to_query_string(),
            })),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Body::Multipart(_))
    }

    /// The content type this body implies, if any.
    pub fn content_type(&self) -> Option<String> {
        match self {
            Body::Raw(_) => None,
            Body::UrlEncoded(_) => Some(FORM_URLENCODED.to_string()),
            Body::Multipart(multipart) => Some(multipart.content_type()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Body::Raw(_) => "raw",
            Body::UrlEncoded(_) => "urlencoded",
            Body::Multipart(_) => "multipart",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Raw(bytes) => bytes,
            Body::UrlEncoded(text) => text.into_bytes(),
            Body::Multipart(multipart) => multipart.to_bytes(),
        }
    }
}
