//! # Flagon
//!
//! **Flagon** is a small web microframework on top of the `may` coroutine
//! runtime: URL routing, per-request contexts, signed cookie sessions,
//! flash messages, templates, and before/after request hooks.
//!
//! ## Architecture
//!
//! - **[`router`]** - URL rules with `<name>`, `<int:name>` and `<path:name>`
//!   placeholders, request matching and URL building
//! - **[`context`]** - the coroutine-local request-context stack and the
//!   accessors handlers use to reach the current request, session and `g`
//! - **[`dispatcher`]** - handler and error-handler registry, failure types
//!   and response coercion
//! - **[`session`]** - HMAC-signed cookie sessions
//! - **[`templating`]** - `minijinja` templates with `url_for` and
//!   `get_flashed_messages` globals
//! - **[`app`]** - the application object and its request pipeline
//! - **[`server`]** - request/response records and the `may_minihttp` adapter
//! - **[`testing`]** - in-process test client with a cookie jar
//! - **[`config`]** - YAML and environment configuration
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may_minihttp)
//!     participant App as App::handle
//!     participant Stack as Context Stack
//!     participant Router
//!     participant Handler
//!
//!     Client->>Server: GET /user/7
//!     Server->>App: Request
//!     App->>Stack: push RequestContext (session opened)
//!     App->>App: before_request hooks
//!     alt hook returned a reply
//!         App->>App: use it
//!     else
//!         App->>Router: match_request()
//!         alt matched
//!             App->>Handler: handler(view_args)
//!             Handler-->>App: Reply or HandlerError
//!         else routing failure
//!             Router-->>App: 404 / 405 / 301
//!         end
//!         App->>App: error handler lookup by status
//!     end
//!     App->>App: Reply → Response
//!     App->>App: save session, after_request hooks
//!     App->>Stack: pop
//!     App-->>Server: Response
//!     Server-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use flagon::prelude::*;
//!
//! let mut app = App::new(AppConfig {
//!     secret_key: Some("dev".into()),
//!     ..AppConfig::default()
//! });
//! app.route("/", "index", |_| {
//!     context::flash("welcome")?;
//!     Ok(Reply::from("Hello"))
//! })
//! .unwrap();
//!
//! let app = app.into_shared();
//! let mut client = app.test_client();
//! let response = client.get("/").unwrap();
//! assert_eq!(response.body_text(), "Hello");
//! assert!(client.cookie("session").is_some());
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod ids;
pub mod logging;
pub mod router;
pub mod server;
pub mod session;
pub mod templating;
pub mod testing;

pub use app::App;
pub use config::AppConfig;
pub use dispatcher::{abort, redirect, HandlerError, HttpError, Reply};
pub use server::{Request, Response};

/// Everything a typical application needs.
pub mod prelude {
    pub use crate::app::App;
    pub use crate::config::AppConfig;
    pub use crate::context;
    pub use crate::dispatcher::{abort, redirect, HandlerError, HttpError, Reply};
    pub use crate::router::{RuleOptions, ViewArgs};
    pub use crate::server::{Request, Response};
    pub use crate::templating::TemplateContext;
}
