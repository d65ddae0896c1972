//! # Server Module
//!
//! Request and response records plus the `may_minihttp` transport adapter.
//!
//! - [`Request`] / [`Response`] are what the pipeline consumes and produces;
//!   tests build them by hand.
//! - [`AppService`] turns raw `may_minihttp` requests into [`Request`]s,
//!   runs them through the application, and writes the result back.
//! - [`HttpServer`] / [`ServerHandle`] start and stop the listener.
//!
//! ```rust,no_run
//! use flagon::app::App;
//! use flagon::config::AppConfig;
//! use flagon::dispatcher::Reply;
//! use flagon::server::{AppService, HttpServer};
//!
//! let mut app = App::new(AppConfig::default());
//! app.route("/", "index", |_| Ok(Reply::from("Hello"))).unwrap();
//! let handle = HttpServer(AppService::new(app.into_shared())).start("127.0.0.1:8080").unwrap();
//! handle.join().unwrap();
//! ```

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle, MAX_REQUEST_HEADERS};
pub use request::{parse_cookie_header, parse_query_string, parse_request, Request};
pub use response::{status_reason, write_internal_error, CookieOptions, Response, DEFAULT_MIMETYPE};
pub use service::AppService;
