use http::Method;
use minijinja::HtmlEscape;
use std::fmt;
use std::sync::Arc;

use super::core::HeaderVec;
use crate::context::ContextError;
use crate::router::{BuildError, RoutingError};
use crate::server::{status_reason, Response};
use crate::templating::TemplateError;

/// HTTP-level failure carrying a status code.
///
/// Raised by routing (404/405/301) or by handlers via [`abort`]. The
/// pipeline looks up an error handler registered for `status`; without one
/// the error itself becomes the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
    pub description: Option<String>,
    /// Extra headers for the default rendering (`Allow`, `Location`)
    pub headers: HeaderVec,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            description: None,
            headers: HeaderVec::new(),
        }
    }

    #[must_use]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404).with_description(
            "The requested URL was not found on the server.",
        )
    }

    #[must_use]
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
        let mut err = Self::new(405)
            .with_description("The method is not allowed for the requested URL.");
        err.headers.push((Arc::from("allow"), allow.join(", ")));
        err
    }

    #[must_use]
    pub fn redirect(status: u16, location: &str) -> Self {
        let mut err = Self::new(status)
            .with_description(format!("Redirecting to {location}"));
        err.headers.push((Arc::from("location"), location.to_string()));
        err
    }

    /// Reason phrase for the status code.
    #[must_use]
    pub fn name(&self) -> &'static str {
        status_reason(self.status)
    }

    /// Default HTML rendering of the error. The description is escaped.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let description = HtmlEscape(self.description.as_deref().unwrap_or(""));
        let body = format!(
            "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
             <title>{code} {name}</title>\n\
             <h1>{name}</h1>\n\
             <p>{description}</p>\n",
            code = self.status,
            name = self.name(),
        );
        Response::from_parts(body, Some(self.status), Some(self.headers.clone()))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{} {}: {}", self.status, self.name(), d),
            None => write!(f, "{} {}", self.status, self.name()),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<RoutingError> for HttpError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::NotFound => HttpError::not_found(),
            RoutingError::MethodNotAllowed { allowed } => HttpError::method_not_allowed(&allowed),
            RoutingError::RequestRedirect { location } => HttpError::redirect(301, &location),
        }
    }
}

/// Abort the current handler with an HTTP status.
///
/// ```rust
/// use flagon::dispatcher::{abort, HandlerError};
///
/// let err: HandlerError = abort(403);
/// assert_eq!(err.status(), 403);
/// ```
#[must_use]
pub fn abort(status: u16) -> HandlerError {
    HandlerError::Http(HttpError::new(status))
}

/// Failure returned by a handler.
#[derive(Debug)]
pub enum HandlerError {
    /// HTTP-level failure, recoverable through the status-code handler table
    Http(HttpError),
    /// Anything else; recoverable only through a 500 handler outside debug mode
    Internal(anyhow::Error),
}

impl HandlerError {
    /// Status code used for the error-handler lookup.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            HandlerError::Http(e) => e.status,
            HandlerError::Internal(_) => 500,
        }
    }

    #[must_use]
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            HandlerError::Http(e) => Some(e),
            HandlerError::Internal(_) => None,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Http(e) => write!(f, "{e}"),
            HandlerError::Internal(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Http(e) => Some(e),
            HandlerError::Internal(e) => Some(e.as_ref()),
        }
    }
}

impl From<HttpError> for HandlerError {
    fn from(err: HttpError) -> Self {
        HandlerError::Http(err)
    }
}

impl From<RoutingError> for HandlerError {
    fn from(err: RoutingError) -> Self {
        HandlerError::Http(err.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Internal(err)
    }
}

impl From<ContextError> for HandlerError {
    fn from(err: ContextError) -> Self {
        HandlerError::Internal(err.into())
    }
}

impl From<BuildError> for HandlerError {
    fn from(err: BuildError) -> Self {
        HandlerError::Internal(err.into())
    }
}

impl From<TemplateError> for HandlerError {
    fn from(err: TemplateError) -> Self {
        HandlerError::Internal(err.into())
    }
}

/// A handler result that cannot be turned into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub kind: String,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler returned a {} value that cannot be coerced into a response", self.kind)
    }
}

impl std::error::Error for CoercionError {}

/// Abnormal termination of one request's pipeline.
///
/// The transport receives this instead of a response. In debug mode the
/// request context is left on the stack when this is returned.
#[derive(Debug)]
pub enum DispatchError {
    /// A rule references an endpoint with no registered handler (setup bug)
    UnregisteredEndpoint { endpoint: String },
    /// Generic handler failure with no 500 handler, or debug mode is on
    Unhandled(anyhow::Error),
    /// An error handler itself failed
    ErrorHandler { status: u16, source: anyhow::Error },
    /// A before-request hook failed
    BeforeRequest(anyhow::Error),
    /// An after-request hook failed
    AfterRequest(anyhow::Error),
    /// The result could not be coerced into a response
    Coercion(CoercionError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnregisteredEndpoint { endpoint } => {
                write!(f, "no handler registered for endpoint '{endpoint}'")
            }
            DispatchError::Unhandled(e) => write!(f, "unhandled handler failure: {e:#}"),
            DispatchError::ErrorHandler { status, source } => {
                write!(f, "error handler for {status} failed: {source:#}")
            }
            DispatchError::BeforeRequest(e) => write!(f, "before-request hook failed: {e:#}"),
            DispatchError::AfterRequest(e) => write!(f, "after-request hook failed: {e:#}"),
            DispatchError::Coercion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::UnregisteredEndpoint { .. } => None,
            DispatchError::Unhandled(e)
            | DispatchError::BeforeRequest(e)
            | DispatchError::AfterRequest(e)
            | DispatchError::ErrorHandler { source: e, .. } => Some(e.as_ref()),
            DispatchError::Coercion(e) => Some(e),
        }
    }
}

impl From<CoercionError> for DispatchError {
    fn from(err: CoercionError) -> Self {
        DispatchError::Coercion(err)
    }
}
