//! Router core module - hot path for request routing.
//!
//! The rule table is built once during application setup and shared behind
//! an `Arc`. Binding it to a request clones the `Arc`, not the rules.

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::error::{BuildError, RoutingError, RuleError};
use super::rule::{Rule, RuleOptions};

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 placeholders (e.g., /users/<id>/posts/<post_id>).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the rule table, which
/// is known at startup; values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Named path parameters captured by a rule, passed to the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewArgs {
    params: ParamVec,
}

impl ViewArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter by name.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a parameter into `T`; `None` when absent or unparsable.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Convert to a HashMap (allocates; prefer `get()` in handlers)
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl From<ParamVec> for ViewArgs {
    fn from(params: ParamVec) -> Self {
        Self { params }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ViewArgs {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (Arc::from(k), v.to_string()))
                .collect(),
        }
    }
}

impl serde::Serialize for ViewArgs {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for (k, v) in &self.params {
            map.serialize_entry(k.as_ref(), v)?;
        }
        map.end()
    }
}

/// Result of successfully matching a request to a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Endpoint the matched rule points at
    pub endpoint: String,
    /// Captured path parameters
    pub view_args: ViewArgs,
}

/// The endpoint → rule table.
///
/// Rules are tried in registration order; the first rule whose pattern and
/// method both match wins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: Arc<Vec<Rule>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a rule.
    ///
    /// # Errors
    ///
    /// Returns a `RuleError` if the pattern cannot be compiled.
    pub fn add(&mut self, pattern: &str, endpoint: &str, options: RuleOptions) -> Result<(), RuleError> {
        let rule = Rule::new(pattern, endpoint, options)?;
        info!(
            pattern = %rule.pattern(),
            endpoint = %rule.endpoint(),
            methods = ?rule.methods(),
            build_only = rule.is_build_only(),
            "URL rule registered"
        );
        Arc::make_mut(&mut self.rules).push(rule);
        Ok(())
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Endpoints referenced by the table, in registration order, deduplicated.
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for rule in self.rules.iter() {
            if !seen.contains(&rule.endpoint()) {
                seen.push(rule.endpoint());
            }
        }
        seen
    }

    /// Bind the table to one request.
    #[must_use]
    pub fn bind(&self, path: &str, host: &str, method: Method) -> MapAdapter {
        MapAdapter {
            rules: Arc::clone(&self.rules),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            host: host.to_string(),
            method,
        }
    }

    /// Print all registered rules to stdout
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.rules.len());
        for rule in self.rules.iter() {
            let methods: Vec<&str> = rule.methods().iter().map(Method::as_str).collect();
            println!(
                "[route] {} {} -> {}{}",
                methods.join(","),
                rule.pattern(),
                rule.endpoint(),
                if rule.is_build_only() { " (build only)" } else { "" }
            );
        }
    }
}

/// A rule table bound to one request's path, host and method.
#[derive(Debug, Clone)]
pub struct MapAdapter {
    rules: Arc<Vec<Rule>>,
    path: String,
    host: String,
    method: Method,
}

impl MapAdapter {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Match the bound request.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no rule matches the path
    /// - `MethodNotAllowed` when rules match the path but none allows the method
    /// - `RequestRedirect` when the path only matches with a trailing slash added
    pub fn match_request(&self) -> Result<RouteMatch, RoutingError> {
        debug!(method = %self.method, path = %self.path, "Route match attempt");
        let start = Instant::now();

        let mut allowed: Vec<Method> = Vec::new();
        let mut redirect: Option<String> = None;

        for rule in self.rules.iter().filter(|r| !r.is_build_only()) {
            if let Some(view_args) = rule.captures(&self.path) {
                if rule.allows(&self.method) {
                    let elapsed = start.elapsed();
                    let slow = elapsed > Duration::from_millis(1);
                    if slow {
                        warn!(
                            method = %self.method,
                            path = %self.path,
                            endpoint = %rule.endpoint(),
                            rule = %rule.pattern(),
                            duration_us = elapsed.as_micros(),
                            "Slow route matching detected"
                        );
                    } else {
                        info!(
                            method = %self.method,
                            path = %self.path,
                            endpoint = %rule.endpoint(),
                            rule = %rule.pattern(),
                            view_args = ?view_args,
                            duration_us = elapsed.as_micros(),
                            "Route matched"
                        );
                    }
                    return Ok(RouteMatch {
                        endpoint: rule.endpoint().to_string(),
                        view_args,
                    });
                }
                for m in rule.methods() {
                    if !allowed.contains(m) {
                        allowed.push(m.clone());
                    }
                }
            } else if redirect.is_none()
                && rule.wants_trailing_slash()
                && !self.path.ends_with('/')
                && rule.allows(&self.method)
            {
                let slashed = format!("{}/", self.path);
                if rule.captures(&slashed).is_some() {
                    redirect = Some(slashed);
                }
            }
        }

        let err = if !allowed.is_empty() {
            RoutingError::MethodNotAllowed { allowed }
        } else if let Some(location) = redirect {
            RoutingError::RequestRedirect { location }
        } else {
            RoutingError::NotFound
        };

        warn!(
            method = %self.method,
            path = %self.path,
            status = err.status(),
            duration_us = start.elapsed().as_micros(),
            "No route matched"
        );
        Err(err)
    }

    /// Build a URL path for `endpoint`.
    ///
    /// Values not consumed by the rule are appended as a query string.
    ///
    /// # Errors
    ///
    /// `UnknownEndpoint` if no rule names the endpoint; `MissingParameters`
    /// if every candidate rule needs a value that was not supplied;
    /// `InvalidValue` if a value does not fit its converter.
    pub fn build(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, BuildError> {
        let mut first_missing: Option<Vec<String>> = None;
        for rule in self.rules.iter().filter(|r| r.endpoint() == endpoint) {
            let missing = rule.missing(values);
            if missing.is_empty() {
                return rule.build(values);
            }
            if first_missing.is_none() {
                first_missing = Some(missing.into_iter().map(str::to_string).collect());
            }
        }
        match first_missing {
            Some(missing) => Err(BuildError::MissingParameters {
                endpoint: endpoint.to_string(),
                missing,
            }),
            None => Err(BuildError::UnknownEndpoint {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}
