use may_minihttp::Response as RawResponse;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

use crate::dispatcher::HeaderVec;

/// Content type used when a handler returns a bare string.
pub const DEFAULT_MIMETYPE: &str = "text/html; charset=utf-8";

/// Canonical reason phrase for a status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Attributes for `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub max_age: Option<i64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            http_only: false,
            secure: false,
            max_age: None,
        }
    }
}

/// Outbound response record handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers; `set-cookie` may repeat
    pub headers: HeaderVec,
    /// Response body
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Response {
    /// A 200 response with the default `text/html` content type.
    #[must_use]
    pub fn new<B: Into<Vec<u8>>>(body: B) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), DEFAULT_MIMETYPE.to_string()));
        Self {
            status: 200,
            headers,
            body: body.into(),
        }
    }

    /// Expanded form of a `(body, status, headers)` tuple.
    ///
    /// Supplied headers override the defaults with the same name.
    #[must_use]
    pub fn from_parts<B: Into<Vec<u8>>>(body: B, status: Option<u16>, headers: Option<HeaderVec>) -> Self {
        let mut response = Self::new(body);
        if let Some(status) = status {
            response.status = status;
        }
        for (name, value) in headers.unwrap_or_default() {
            response.set_header(&name, value);
        }
        response
    }

    /// A JSON response.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::new(body.to_string());
        response.status = status;
        response.set_header("content-type", "application/json".to_string());
        response
    }

    /// A plain-text response.
    #[must_use]
    pub fn text<S: Into<String>>(status: u16, body: S) -> Self {
        let mut response = Self::new(body.into());
        response.status = status;
        response.set_header("content-type", "text/plain; charset=utf-8".to_string());
        response
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header, in insertion order
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((Arc::from(name.as_str()), value));
    }

    /// Append a header without replacing existing values
    pub fn append_header(&mut self, name: &str, value: String) {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase().as_str()), value));
    }

    #[must_use]
    pub fn mimetype(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body decoded as JSON; `None` if malformed.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Append a `Set-Cookie` header.
    pub fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let mut cookie = format!("{name}={value}; Path={}", options.path);
        if let Some(max_age) = options.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if options.secure {
            cookie.push_str("; Secure");
        }
        self.append_header("set-cookie", cookie);
    }

    /// Expire a cookie on the client.
    pub fn delete_cookie(&mut self, name: &str, path: &str) {
        let options = CookieOptions {
            path: path.to_string(),
            max_age: Some(0),
            ..CookieOptions::default()
        };
        self.set_cookie(name, "", &options);
    }
}

/// Header lines that never vary, served without allocating.
fn well_known_line(name: &str, value: &str) -> Option<&'static str> {
    if !name.eq_ignore_ascii_case("content-type") {
        return None;
    }
    match value {
        DEFAULT_MIMETYPE => Some("content-type: text/html; charset=utf-8"),
        "application/json" => Some("content-type: application/json"),
        "text/plain; charset=utf-8" => Some("content-type: text/plain; charset=utf-8"),
        _ => None,
    }
}

fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\r', '\n']) {
        Cow::Owned(text.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// Owned storage for the header lines of the response being written on one
/// connection.
///
/// may_minihttp only accepts `&'static str` header lines and copies them
/// into its write buffer right after [`HttpService::call`] returns. Lines
/// are kept here until [`HeaderLines::reset`] runs at the start of the next
/// request on the same connection, so memory stays bounded by the largest
/// single response.
///
/// [`HttpService::call`]: may_minihttp::HttpService::call
#[derive(Debug, Default)]
pub(crate) struct HeaderLines {
    lines: Vec<Box<str>>,
}

impl HeaderLines {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop the lines of the previous response.
    pub(crate) fn reset(&mut self) {
        self.lines.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Format `name: value`, reusing a static line when one exists.
    ///
    /// Line breaks inside either part become spaces so a value cannot start
    /// a header of its own.
    #[allow(unsafe_code)]
    pub(crate) fn line(&mut self, name: &str, value: &str) -> &'static str {
        if let Some(line) = well_known_line(name, value) {
            return line;
        }
        let boxed: Box<str> = format!("{}: {}", single_line(name), single_line(value)).into_boxed_str();
        let ptr: *const str = &*boxed;
        self.lines.push(boxed);
        // SAFETY: the boxed allocation does not move when `lines` grows and is
        // only freed by `reset` or drop, both of which happen after the
        // transport has encoded the response that borrowed it.
        unsafe { &*ptr }
    }
}

/// Write a `Response` into the transport's response.
///
/// `lines` must outlive the encoding of `res`; see [`HeaderLines`].
pub(crate) fn write_response(res: &mut RawResponse, response: Response, lines: &mut HeaderLines) {
    lines.reset();
    res.status_code(response.status as usize, status_reason(response.status));
    for (name, value) in &response.headers {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        res.header(lines.line(name, value));
    }
    res.body_vec(response.body);
}

/// Plain 500 used when the pipeline terminated abnormally.
pub fn write_internal_error(res: &mut RawResponse) {
    res.status_code(500, status_reason(500));
    res.header("content-type: text/plain; charset=utf-8");
    res.body_vec(b"Internal Server Error".to_vec());
}
