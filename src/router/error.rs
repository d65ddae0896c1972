use http::Method;
use std::fmt;

/// Rule registration error
///
/// Returned by `Rule::new()` when a pattern cannot be compiled. These are
/// setup bugs, reported before the application serves anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Patterns are absolute paths
    MissingLeadingSlash { pattern: String },
    /// Placeholder uses a converter other than `default`, `int` or `path`
    UnknownConverter { pattern: String, converter: String },
    /// Same placeholder name appears twice in one pattern
    DuplicateParameter { pattern: String, name: String },
    /// The compiled regex was rejected
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::MissingLeadingSlash { pattern } => {
                write!(f, "rule pattern '{pattern}' must start with '/'")
            }
            RuleError::UnknownConverter { pattern, converter } => {
                write!(f, "rule pattern '{pattern}' uses unknown converter '{converter}'")
            }
            RuleError::DuplicateParameter { pattern, name } => {
                write!(f, "rule pattern '{pattern}' repeats parameter '{name}'")
            }
            RuleError::InvalidPattern { pattern, reason } => {
                write!(f, "rule pattern '{pattern}' is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// Routing failure for a bound request
///
/// All variants are HTTP-level conditions; the dispatch pipeline converts
/// them into an `HttpError` and runs them through the error-handler lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No rule matches the path (404)
    NotFound,
    /// A rule matches the path but not the method (405)
    MethodNotAllowed { allowed: Vec<Method> },
    /// The path is missing a trailing slash the matching rule requires (301)
    RequestRedirect { location: String },
}

impl RoutingError {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RoutingError::NotFound => 404,
            RoutingError::MethodNotAllowed { .. } => 405,
            RoutingError::RequestRedirect { .. } => 301,
        }
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::NotFound => write!(f, "no rule matches the requested URL"),
            RoutingError::MethodNotAllowed { allowed } => {
                let allowed: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                write!(f, "method not allowed; allowed: {}", allowed.join(", "))
            }
            RoutingError::RequestRedirect { location } => {
                write!(f, "redirect to canonical URL '{location}'")
            }
        }
    }
}

impl std::error::Error for RoutingError {}

/// URL building failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No rule is registered for the endpoint
    UnknownEndpoint { endpoint: String },
    /// Every rule for the endpoint needs values that were not supplied
    MissingParameters { endpoint: String, missing: Vec<String> },
    /// A value does not fit the placeholder's converter
    InvalidValue {
        endpoint: String,
        parameter: String,
        value: String,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnknownEndpoint { endpoint } => {
                write!(f, "could not build url for unknown endpoint '{endpoint}'")
            }
            BuildError::MissingParameters { endpoint, missing } => write!(
                f,
                "could not build url for endpoint '{endpoint}': missing {}",
                missing.join(", ")
            ),
            BuildError::InvalidValue {
                endpoint,
                parameter,
                value,
            } => write!(
                f,
                "could not build url for endpoint '{endpoint}': '{value}' is not valid for '{parameter}'"
            ),
        }
    }
}

impl std::error::Error for BuildError {}
