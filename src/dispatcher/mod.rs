//! # Dispatcher Module
//!
//! Handler registry, error recovery and response coercion.
//!
//! ## Overview
//!
//! - [`Dispatcher`] keeps the endpoint → handler map, the status → error
//!   handler map and the before/after request hooks.
//! - [`HandlerError`] is what a handler returns on failure: either an
//!   [`HttpError`] (404, 403, ...) or a generic `anyhow::Error`.
//! - [`Reply`] is the closed set of things a handler may return; it is
//!   coerced into a [`Response`](crate::server::Response) once per request.
//! - [`DispatchError`] is an abnormal termination handed back to the
//!   transport instead of a response.
//!
//! ## Example
//!
//! ```rust
//! use flagon::dispatcher::{abort, Dispatcher, Reply};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register_handler("index", |_args| Ok(Reply::from("Hello")));
//! dispatcher.register_handler("secret", |_args| Err(abort(403)));
//! assert!(dispatcher.has_handler("index"));
//! ```

mod core;
mod error;
mod reply;

pub use core::{
    AfterRequestHook, BeforeRequestHook, Dispatcher, ErrorHandler, Handler, HeaderVec,
    MAX_INLINE_HEADERS,
};
pub use error::{abort, CoercionError, DispatchError, HandlerError, HttpError};
pub use reply::{redirect, ForeignResponse, Reply};
