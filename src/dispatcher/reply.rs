use serde_json::Value;
use std::fmt::Debug;

use super::core::HeaderVec;
use super::error::{CoercionError, HttpError};
use crate::server::{Request, Response};

/// A response-like value that knows how to turn itself into a [`Response`].
///
/// Anything a handler wants to return that is not a string, tuple or
/// `Response` goes through this trait. The request is available so the
/// conversion can depend on it (content negotiation, absolute URLs).
pub trait ForeignResponse: Send + Debug {
    /// Convert into a `Response`.
    ///
    /// # Errors
    ///
    /// Returns a `CoercionError` when the value has no response form.
    fn force_type(self: Box<Self>, request: &Request) -> Result<Response, CoercionError>;
}

impl ForeignResponse for HttpError {
    fn force_type(self: Box<Self>, _request: &Request) -> Result<Response, CoercionError> {
        Ok(self.to_response())
    }
}

/// Objects and arrays become `application/json`; scalars are rejected.
impl ForeignResponse for Value {
    fn force_type(self: Box<Self>, _request: &Request) -> Result<Response, CoercionError> {
        let kind = match *self {
            Value::Object(_) | Value::Array(_) => return Ok(Response::json(200, &self)),
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "json string",
        };
        Err(CoercionError { kind: kind.to_string() })
    }
}

/// Everything a handler or error handler may return.
#[derive(Debug)]
pub enum Reply {
    /// Used unchanged
    Response(Response),
    /// Body with the default `text/html; charset=utf-8` type
    Text(String),
    /// Expanded into `Response::from_parts`
    Tuple {
        body: String,
        status: Option<u16>,
        headers: Option<HeaderVec>,
    },
    /// Converted through `ForeignResponse::force_type`
    Foreign(Box<dyn ForeignResponse>),
}

impl Reply {
    /// Coerce into a `Response`.
    ///
    /// # Errors
    ///
    /// Only a `Foreign` value can fail to convert.
    pub fn into_response(self, request: &Request) -> Result<Response, CoercionError> {
        match self {
            Reply::Response(r) => Ok(r),
            Reply::Text(body) => Ok(Response::new(body)),
            Reply::Tuple {
                body,
                status,
                headers,
            } => Ok(Response::from_parts(body, status, headers)),
            Reply::Foreign(value) => value.force_type(request),
        }
    }

    /// Wrap any `ForeignResponse`.
    #[must_use]
    pub fn foreign<T: ForeignResponse + 'static>(value: T) -> Self {
        Reply::Foreign(Box::new(value))
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Reply::Response(r)
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl<S: Into<String>> From<(S, u16)> for Reply {
    fn from((body, status): (S, u16)) -> Self {
        Reply::Tuple {
            body: body.into(),
            status: Some(status),
            headers: None,
        }
    }
}

impl<S: Into<String>> From<(S, u16, HeaderVec)> for Reply {
    fn from((body, status, headers): (S, u16, HeaderVec)) -> Self {
        Reply::Tuple {
            body: body.into(),
            status: Some(status),
            headers: Some(headers),
        }
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Foreign(Box::new(v))
    }
}

impl From<HttpError> for Reply {
    fn from(e: HttpError) -> Self {
        Reply::Foreign(Box::new(e))
    }
}

/// Redirect to `location` with a 302.
#[must_use]
pub fn redirect(location: &str) -> Response {
    HttpError::redirect(302, location).to_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_text_gets_default_mimetype() {
        let r = Reply::from("hi").into_response(&Request::get("/")).unwrap();
        assert_eq!(r.status, 200);
        assert_eq!(r.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(r.body_text(), "hi");
    }

    #[test]
    fn test_tuple_forms() {
        let req = Request::get("/");
        let r = Reply::from(("gone", 410)).into_response(&req).unwrap();
        assert_eq!(r.status, 410);

        let mut headers = HeaderVec::new();
        headers.push((Arc::from("x-a"), "1".to_string()));
        let r = Reply::from(("made", 201, headers)).into_response(&req).unwrap();
        assert_eq!(r.status, 201);
        assert_eq!(r.header("x-a"), Some("1"));
    }

    #[test]
    fn test_foreign_json() {
        let req = Request::get("/");
        let r = Reply::from(json!({"a": 1})).into_response(&req).unwrap();
        assert_eq!(r.mimetype(), Some("application/json"));

        let err = Reply::from(json!(42)).into_response(&req).unwrap_err();
        assert_eq!(err.kind, "number");
    }

    #[test]
    fn test_redirect() {
        let r = redirect("/login");
        assert_eq!(r.status, 302);
        assert_eq!(r.header("location"), Some("/login"));
    }
}
