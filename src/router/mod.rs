//! # Router Module
//!
//! Maps request paths to endpoints and builds URLs back from endpoints.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Holding the ordered endpoint → rule table filled during application setup
//! - Binding the table to one request (`Router::bind` → `MapAdapter`)
//! - Matching the bound request to an endpoint and its path parameters
//! - Reporting `NotFound` / `MethodNotAllowed` / `RequestRedirect` failures
//! - Building URLs for `url_for`
//!
//! ## Example
//!
//! ```rust
//! use flagon::router::{Router, RuleOptions};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add("/pets/<int:id>", "get_pet", RuleOptions::default()).unwrap();
//!
//! let adapter = router.bind("/pets/42", "localhost", Method::GET);
//! let m = adapter.match_request().unwrap();
//! assert_eq!(m.endpoint, "get_pet");
//! assert_eq!(m.view_args.get("id"), Some("42"));
//! assert_eq!(adapter.build("get_pet", &[("id", "7")]).unwrap(), "/pets/7");
//! ```

mod core;
mod error;
mod rule;
#[cfg(test)]
mod tests;

pub use core::{MapAdapter, ParamVec, RouteMatch, Router, ViewArgs, MAX_INLINE_PARAMS};
pub use error::{BuildError, RoutingError, RuleError};
pub use rule::{Converter, MethodVec, Rule, RuleOptions};
