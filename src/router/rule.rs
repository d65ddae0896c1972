//! URL rules: pattern parsing, compilation to regex, and URL building.
//!
//! A rule pattern is a path with named placeholders:
//!
//! - `<name>` matches one path segment (anything but `/`)
//! - `<int:name>` matches one or more ASCII digits
//! - `<path:name>` matches the rest of the path, slashes included
//!
//! ```rust
//! use flagon::router::{Rule, RuleOptions};
//!
//! let rule = Rule::new("/users/<int:id>", "show_user", RuleOptions::default()).unwrap();
//! assert_eq!(rule.param_names().collect::<Vec<_>>(), vec!["id"]);
//! ```

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

use super::core::{ParamVec, ViewArgs};
use super::error::{BuildError, RuleError};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"<(?:(?P<conv>[A-Za-z_][A-Za-z0-9_]*):)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)>")
        .expect("placeholder regex is valid")
});

/// Methods most rules carry; a rule rarely allows more than four.
pub type MethodVec = SmallVec<[Method; 4]>;

/// How a placeholder matches and builds its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// One path segment.
    Default,
    /// ASCII digits only.
    Int,
    /// Digits, a dot, digits (`1.5`, not `1` or `.5`).
    Float,
    /// Remaining path, slashes included.
    Path,
}

impl Converter {
    fn parse(name: Option<&str>, pattern: &str) -> Result<Self, RuleError> {
        match name {
            None | Some("default") | Some("string") => Ok(Converter::Default),
            Some("int") => Ok(Converter::Int),
            Some("float") => Ok(Converter::Float),
            Some("path") => Ok(Converter::Path),
            Some(other) => Err(RuleError::UnknownConverter {
                pattern: pattern.to_string(),
                converter: other.to_string(),
            }),
        }
    }

    fn regex(self) -> &'static str {
        match self {
            Converter::Default => "([^/]+)",
            Converter::Int => r"(\d+)",
            Converter::Float => r"(\d+\.\d+)",
            Converter::Path => "([^/].*?)",
        }
    }

    fn encode(self, value: &str) -> Result<String, ()> {
        match self {
            Converter::Default => Ok(urlencoding::encode(value).into_owned()),
            Converter::Int => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(value.to_string())
                } else {
                    Err(())
                }
            }
            Converter::Float => match value.split_once('.') {
                Some((whole, frac))
                    if !whole.is_empty()
                        && !frac.is_empty()
                        && whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) =>
                {
                    Ok(value.to_string())
                }
                _ => Err(()),
            },
            Converter::Path => Ok(value
                .split('/')
                .map(|seg| urlencoding::encode(seg).into_owned())
                .collect::<Vec<_>>()
                .join("/")),
        }
    }
}

#[derive(Debug, Clone)]
enum RulePart {
    Static(String),
    Param { name: Arc<str>, converter: Converter },
}

/// Registration options for a rule.
///
/// Defaults to `GET` only and a matchable (not build-only) rule.
#[derive(Debug, Clone)]
pub struct RuleOptions {
    pub methods: MethodVec,
    pub build_only: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            methods: smallvec![Method::GET],
            build_only: false,
        }
    }
}

impl RuleOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed methods.
    #[must_use]
    pub fn methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Mark the rule as usable for URL building only.
    #[must_use]
    pub fn build_only(mut self, build_only: bool) -> Self {
        self.build_only = build_only;
        self
    }
}

/// A compiled URL rule bound to an endpoint.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    endpoint: String,
    methods: MethodVec,
    build_only: bool,
    parts: Vec<RulePart>,
    regex: Regex,
}

impl Rule {
    /// Parse and compile `pattern` for `endpoint`.
    ///
    /// `HEAD` is added whenever `GET` is allowed.
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not start with `/`, uses an unknown
    /// converter, or repeats a placeholder name.
    pub fn new(pattern: &str, endpoint: &str, options: RuleOptions) -> Result<Self, RuleError> {
        if !pattern.starts_with('/') {
            return Err(RuleError::MissingLeadingSlash {
                pattern: pattern.to_string(),
            });
        }

        let mut parts = Vec::new();
        let mut regex_src = String::with_capacity(pattern.len() + 8);
        regex_src.push('^');
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(pattern) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };
            let converter = Converter::parse(caps.name("conv").map(|m| m.as_str()), pattern)?;
            let name = name.as_str();

            if parts
                .iter()
                .any(|p| matches!(p, RulePart::Param { name: n, .. } if n.as_ref() == name))
            {
                return Err(RuleError::DuplicateParameter {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }

            let literal = &pattern[last..whole.start()];
            if !literal.is_empty() {
                regex_src.push_str(&regex::escape(literal));
                parts.push(RulePart::Static(literal.to_string()));
            }
            regex_src.push_str(converter.regex());
            parts.push(RulePart::Param {
                name: Arc::from(name),
                converter,
            });
            last = whole.end();
        }

        let tail = &pattern[last..];
        if !tail.is_empty() {
            regex_src.push_str(&regex::escape(tail));
            parts.push(RulePart::Static(tail.to_string()));
        }
        regex_src.push('$');

        let regex = Regex::new(&regex_src).map_err(|e| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut methods = options.methods;
        if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            endpoint: endpoint.to_string(),
            methods,
            build_only: options.build_only,
            parts,
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn is_build_only(&self) -> bool {
        self.build_only
    }

    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Placeholder names in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            RulePart::Param { name, .. } => Some(name.as_ref()),
            RulePart::Static(_) => None,
        })
    }

    /// A rule ending in `/` redirects requests that omit the trailing slash.
    pub(crate) fn wants_trailing_slash(&self) -> bool {
        self.pattern.len() > 1 && self.pattern.ends_with('/')
    }

    /// Match `path` against this rule, capturing placeholder values.
    pub(crate) fn captures(&self, path: &str) -> Option<ViewArgs> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        let names = self.parts.iter().filter_map(|p| match p {
            RulePart::Param { name, .. } => Some(name),
            RulePart::Static(_) => None,
        });
        for (idx, name) in names.enumerate() {
            let raw = caps.get(idx + 1).map(|m| m.as_str()).unwrap_or_default();
            let value = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            params.push((Arc::clone(name), value));
        }
        Some(ViewArgs::from(params))
    }

    /// Names this rule needs that `values` does not provide.
    pub(crate) fn missing<'a>(&'a self, values: &[(&str, &str)]) -> Vec<&'a str> {
        self.param_names()
            .filter(|name| !values.iter().any(|(k, _)| k == name))
            .collect()
    }

    /// Build a path from `values`; unused values become the query string.
    pub(crate) fn build(&self, values: &[(&str, &str)]) -> Result<String, BuildError> {
        let mut out = String::with_capacity(self.pattern.len() + 16);
        for part in &self.parts {
            match part {
                RulePart::Static(s) => out.push_str(s),
                RulePart::Param { name, converter } => {
                    let value = values
                        .iter()
                        .rev()
                        .find(|(k, _)| *k == name.as_ref())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| BuildError::MissingParameters {
                            endpoint: self.endpoint.clone(),
                            missing: vec![name.to_string()],
                        })?;
                    let encoded = converter
                        .encode(value)
                        .map_err(|()| BuildError::InvalidValue {
                            endpoint: self.endpoint.clone(),
                            parameter: name.to_string(),
                            value: value.to_string(),
                        })?;
                    out.push_str(&encoded);
                }
            }
        }

        let extra: Vec<&(&str, &str)> = values
            .iter()
            .filter(|(k, _)| !self.param_names().any(|n| n == *k))
            .collect();
        if !extra.is_empty() {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in extra {
                query.append_pair(k, v);
            }
            out.push('?');
            out.push_str(&query.finish());
        }

        Ok(out)
    }
}
