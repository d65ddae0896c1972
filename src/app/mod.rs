//! # Application
//!
//! [`App`] is the registry of routes, handlers, error handlers, lifecycle
//! hooks, context processors and templates, and it runs the per-request
//! pipeline:
//!
//! 1. push a [`RequestContext`](crate::context::RequestContext)
//! 2. run before-request hooks; the first one returning a reply wins
//! 3. otherwise route the request and call the handler, recovering
//!    failures through the error handler registered for their status
//! 4. coerce the result into a [`Response`](crate::server::Response)
//! 5. save the session and run after-request hooks
//! 6. pop the context
//!
//! ```rust
//! use flagon::app::App;
//! use flagon::config::AppConfig;
//! use flagon::dispatcher::{abort, Reply};
//! use flagon::server::Request;
//!
//! let mut app = App::new(AppConfig::default());
//! app.route("/user/<int:id>", "user", |args| {
//!     let id: u64 = args.parse("id").ok_or_else(|| abort(400))?;
//!     Ok(Reply::from(format!("user {id}")))
//! })
//! .unwrap();
//! app.register_error_handler(404, |_| Ok(Reply::from(("nothing here", 404))));
//!
//! let app = app.into_shared();
//! let response = app.handle(Request::get("/user/7")).unwrap();
//! assert_eq!(response.body_text(), "user 7");
//! let response = app.handle(Request::get("/nope")).unwrap();
//! assert_eq!(response.status, 404);
//! ```

mod core;

pub use core::{App, ContextProcessor};
