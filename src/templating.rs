//! Template rendering on top of `minijinja`.
//!
//! Templates are loaded from the configured directory on first use, or
//! registered in memory with [`Templates::add_template`]. Output is always
//! HTML-escaped. Two globals are available in every template:
//! `url_for(endpoint, **values)` and `get_flashed_messages()`.

use minijinja::value::{Kwargs, Value as TemplateValue};
use minijinja::{AutoEscape, Environment, ErrorKind};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::context::{self, ContextError};

/// Variables handed to a template.
pub type TemplateContext = serde_json::Map<String, serde_json::Value>;

/// Template failure.
#[derive(Debug)]
pub enum TemplateError {
    /// Rendering through the context accessors outside a request
    Context(ContextError),
    /// Lookup, syntax or evaluation failure inside the engine
    Render(minijinja::Error),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Context(e) => write!(f, "cannot render template: {e}"),
            TemplateError::Render(e) => write!(f, "template error: {e}"),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TemplateError::Context(e) => Some(e),
            TemplateError::Render(e) => Some(e),
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        TemplateError::Render(err)
    }
}

impl From<ContextError> for TemplateError {
    fn from(err: ContextError) -> Self {
        TemplateError::Context(err)
    }
}

#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Create the engine, loading files from `template_dir` when given.
    #[must_use]
    pub fn new(template_dir: Option<&Path>) -> Self {
        let mut env = Environment::new();
        if let Some(dir) = template_dir {
            debug!(template_dir = %dir.display(), "Template loader configured");
            env.set_loader(minijinja::path_loader(dir));
        }
        env.set_auto_escape_callback(|_name: &str| AutoEscape::Html);
        env.add_function("url_for", url_for_global);
        env.add_function("get_flashed_messages", get_flashed_messages_global);
        Self { env }
    }

    /// Register a template from source, shadowing a file of the same name.
    ///
    /// # Errors
    ///
    /// Returns the engine's syntax error.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())
            .map_err(TemplateError::from)
    }

    /// Render a named template.
    ///
    /// # Errors
    ///
    /// Unknown templates and evaluation failures.
    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Render template source directly.
    ///
    /// # Errors
    ///
    /// Syntax and evaluation failures.
    pub fn render_str(&self, source: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        Ok(self.env.render_str(source, ctx)?)
    }
}

fn template_error<E: fmt::Display>(err: E) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string())
}

/// Built URLs are already percent-encoded, so they are marked safe.
fn url_for_global(endpoint: String, kwargs: Kwargs) -> Result<TemplateValue, minijinja::Error> {
    let mut values: Vec<(String, String)> = Vec::new();
    for key in kwargs.args() {
        let value: TemplateValue = kwargs.get(key)?;
        let value = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        };
        values.push((key.to_string(), value));
    }
    let values: Vec<(&str, &str)> = values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    context::url_for(&endpoint, &values)
        .map(TemplateValue::from_safe_string)
        .map_err(template_error)
}

fn get_flashed_messages_global() -> Result<Vec<String>, minijinja::Error> {
    context::get_flashed_messages().map_err(template_error)
}
