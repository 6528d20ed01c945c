//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! dispatcher builds `HttpRequest` values and normalizes `HttpResponse`
//! values; executing the round-trip is delegated to a `Transport`. The
//! crate ships a ureq-backed transport, and tests plug in scripted ones.
//!
//! All fields use owned types (`String`, `Vec`) so requests can be queued,
//! logged or replayed without lifetime concerns.

use serde_json::Value;

use crate::error::{DataApiError, Result};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    /// A JSON document, sent as `application/json`.
    Json(String),
    /// A `multipart/form-data` document with the given boundary.
    Multipart { boundary: String, bytes: Vec<u8> },
}

impl HttpBody {
    /// Value of the `Content-Type` header the body must travel with.
    pub fn content_type(&self) -> String {
        match self {
            HttpBody::Json(_) => "application/json".to_string(),
            HttpBody::Multipart { boundary, .. } => {
                format!("multipart/form-data; boundary={boundary}")
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            HttpBody::Json(text) => text.as_bytes(),
            HttpBody::Multipart { bytes, .. } => bytes,
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `RequestDispatcher::build`. `url` is absolute and already
/// carries the encoded query string.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Build a response from a raw header block and body text.
    ///
    /// Each header line is split on its first `:`; names and values are
    /// trimmed and stripped of quote characters. A line without a value,
    /// such as `HTTP/1.1 200 OK`, is stored under the `Status` key and the
    /// numeric status is taken from it when it parses.
    pub fn from_raw(raw_headers: &str, body: &str) -> Self {
        let mut headers = Vec::new();
        for line in raw_headers.lines() {
            let line = clean_token(line);
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    let value = clean_token(value);
                    if !value.is_empty() {
                        headers.push((clean_token(name), value));
                    }
                }
                None => {
                    if find_header(&headers, "Status").is_none() {
                        headers.insert(0, ("Status".to_string(), line));
                    }
                }
            }
        }

        let status = find_header(&headers, "Status")
            .and_then(|line| status_code(line).ok())
            .unwrap_or(0);

        Self {
            status,
            headers,
            body: body.to_string(),
        }
    }

    /// Value of a header, failing when it is absent or empty.
    pub fn header(&self, name: &str) -> Result<&str> {
        find_header(&self.headers, name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DataApiError::HeaderMissing(name.to_string()))
    }

    /// Numeric status taken from the `Status` header line.
    pub fn http_code(&self) -> Result<u16> {
        status_code(self.header("Status")?)
    }

    /// The body parsed as JSON, or `None` for a text body.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes an `HttpRequest` and returns the server's answer as data.
///
/// Implementations must hand back non-2xx responses as `Ok`; the
/// dispatcher owns status interpretation. Only failures to complete the
/// round-trip are `Err`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

/// Trim surrounding whitespace and drop quote characters.
pub(crate) fn clean_token(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn status_code(line: &str) -> Result<u16> {
    line.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| DataApiError::Deserialization(format!("invalid status line: {line}")))
}
