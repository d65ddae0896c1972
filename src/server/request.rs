use http::Method;
use may_minihttp::Request as RawRequest;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::HeaderVec;
use crate::ids::RequestId;
use crate::router::{ParamVec, ViewArgs};

/// Normalized inbound request record.
///
/// Built by the transport (`AppService`) or by hand in tests. `endpoint` and
/// `view_args` stay `None` until routing succeeds for this request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Value of the `Host` header, empty if absent
    pub host: String,
    /// HTTP headers (lowercase names)
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    /// Query string parameters
    pub args: ParamVec,
    /// Raw request body
    pub body: Vec<u8>,
    /// Endpoint resolved by the router
    pub endpoint: Option<String>,
    /// Path parameters resolved by the router
    pub view_args: Option<ViewArgs>,
}

impl Request {
    /// Create a request for `method` and `target`; a query string in the
    /// target is split off into `args`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            host: String::new(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            args: query.map(parse_query_string).unwrap_or_default(),
            body: Vec::new(),
            endpoint: None,
            view_args: None,
        }
    }

    /// Shorthand for `Request::new(Method::GET, target)`.
    #[must_use]
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// Shorthand for `Request::new(Method::POST, target)`.
    #[must_use]
    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    /// Add a header; `Host` and `Cookie` also fill `host` / `cookies`.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "host" => self.host = value.to_string(),
            "cookie" => self.cookies.extend(parse_cookie_header(value)),
            "x-request-id" => self.request_id = RequestId::from_header_or_new(Some(value)),
            _ => {}
        }
        self.headers.push((Arc::from(name.as_str()), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name ("last write wins" on duplicates)
    #[inline]
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Body decoded as JSON; `None` if empty or malformed.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Templates see the request as a plain mapping.
impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let args: HashMap<&str, &str> = self.args.iter().map(|(k, v)| (k.as_ref(), v.as_str())).collect();
        let cookies: HashMap<&str, &str> =
            self.cookies.iter().map(|(k, v)| (k.as_ref(), v.as_str())).collect();

        let mut map = serializer.serialize_map(Some(8))?;
        map.serialize_entry("request_id", &self.request_id)?;
        map.serialize_entry("method", self.method.as_str())?;
        map.serialize_entry("path", &self.path)?;
        map.serialize_entry("host", &self.host)?;
        map.serialize_entry("args", &args)?;
        map.serialize_entry("cookies", &cookies)?;
        map.serialize_entry("endpoint", &self.endpoint)?;
        map.serialize_entry("view_args", &self.view_args)?;
        map.end()
    }
}

/// Parse a `Cookie` header value into name/value pairs.
pub fn parse_cookie_header(value: &str) -> HeaderVec {
    value
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().trim_matches('"');
            Some((Arc::from(name), value.to_string()))
        })
        .collect()
}

/// Parse a raw query string (without the leading `?`).
pub fn parse_query_string(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Convert a `may_minihttp::Request` into a `Request`.
pub fn parse_request(req: RawRequest) -> Request {
    let method_str = req.method().to_string();
    let method = Method::from_bytes(method_str.as_bytes()).unwrap_or(Method::GET);
    let raw_path = req.path().to_string();

    let mut request = Request::new(method, &raw_path);
    for h in req.headers().iter() {
        let value = String::from_utf8_lossy(h.value);
        request = request.with_header(h.name, &value);
    }

    debug!(
        header_count = request.headers.len(),
        cookie_count = request.cookies.len(),
        param_count = request.args.len(),
        "Headers extracted"
    );

    let mut body = Vec::new();
    if let Ok(size) = req.body().read_to_end(&mut body) {
        if size > 0 {
            info!(
                body_size_bytes = size,
                content_type = %request.header("content-type").unwrap_or(""),
                "Request body read"
            );
        }
    }
    request.body = body;

    info!(
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path,
        "HTTP request parsed"
    );

    request
}
