//! # Request Context
//!
//! Every request is served inside a [`RequestContext`] pushed onto a
//! coroutine-local stack. The free functions in this module read the top of
//! that stack, so handlers can reach the current request, session and `g`
//! without threading them through every call:
//!
//! ```rust
//! use flagon::app::App;
//! use flagon::config::AppConfig;
//! use flagon::context;
//! use flagon::server::Request;
//!
//! let app = App::new(AppConfig::default()).into_shared();
//! let guard = app.test_request_context(Request::get("/hello?name=ann"));
//! let name = context::with_request(|r| r.arg("name").map(str::to_string)).unwrap();
//! assert_eq!(name.as_deref(), Some("ann"));
//! drop(guard);
//! assert!(context::with_request(|_| ()).is_err());
//! ```
//!
//! Outside a context every accessor fails with
//! [`ContextError::OutsideRequestContext`].

mod core;
mod error;
mod stack;

pub use core::{ContextGuard, Globals, RequestContext};
pub use error::ContextError;
pub use stack::{depth, pop, push, top};

use std::sync::Arc;

use crate::app::App;
use crate::server::Request;
use crate::session::Session;
use crate::templating::{TemplateContext, TemplateError};

/// The context on top of the stack.
///
/// # Errors
///
/// `OutsideRequestContext` when the stack is empty.
pub fn current() -> Result<Arc<RequestContext>, ContextError> {
    top().ok_or(ContextError::OutsideRequestContext)
}

/// The application serving the current request.
///
/// # Errors
///
/// `OutsideRequestContext` when the stack is empty.
pub fn current_app() -> Result<Arc<App>, ContextError> {
    Ok(Arc::clone(current()?.app()))
}

/// # Errors
///
/// `OutsideRequestContext` when the stack is empty.
pub fn with_request<R>(f: impl FnOnce(&Request) -> R) -> Result<R, ContextError> {
    Ok(current()?.with_request(f))
}

/// # Errors
///
/// `OutsideRequestContext`, or `SessionUnavailable` without a secret key.
pub fn with_session<R>(f: impl FnOnce(&mut Session) -> R) -> Result<R, ContextError> {
    current()?.with_session(f)
}

/// # Errors
///
/// `OutsideRequestContext` when the stack is empty.
pub fn with_g<R>(f: impl FnOnce(&mut Globals) -> R) -> Result<R, ContextError> {
    Ok(current()?.with_g(f))
}

/// # Errors
///
/// `OutsideRequestContext`, or `SessionUnavailable` without a secret key.
pub fn flash(message: &str) -> Result<(), ContextError> {
    current()?.flash(message)
}

/// # Errors
///
/// `OutsideRequestContext` when the stack is empty.
pub fn get_flashed_messages() -> Result<Vec<String>, ContextError> {
    Ok(current()?.get_flashed_messages())
}

/// # Errors
///
/// `OutsideRequestContext`, or `Build` when the URL cannot be built.
pub fn url_for(endpoint: &str, values: &[(&str, &str)]) -> Result<String, ContextError> {
    current()?.url_for(endpoint, values)
}

/// Render a named template with the current application's processors.
///
/// # Errors
///
/// `TemplateError::Context` outside a request, otherwise engine failures.
pub fn render_template(name: &str, ctx: TemplateContext) -> Result<String, TemplateError> {
    current_app()?.render_template(name, ctx)
}

/// # Errors
///
/// `TemplateError::Context` outside a request, otherwise engine failures.
pub fn render_template_string(source: &str, ctx: TemplateContext) -> Result<String, TemplateError> {
    current_app()?.render_template_string(source, ctx)
}
