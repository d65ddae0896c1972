//! Dispatcher core module - handler registry and error recovery.
//!
//! The dispatcher knows nothing about the context stack; `App` binds the
//! request context and drives these steps in order.

use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::{DispatchError, HandlerError};
use super::reply::Reply;
use crate::ids::RequestId;
use crate::router::ViewArgs;
use crate::server::Response;

/// Maximum inline headers/cookies before heap allocation
/// Most requests have ≤16 headers
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage.
///
/// Header names use `Arc<str>` because they repeat across requests; values
/// are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// View function bound to an endpoint
pub type Handler = Arc<dyn Fn(&ViewArgs) -> Result<Reply, HandlerError> + Send + Sync>;

/// Recovery function bound to a status code
pub type ErrorHandler = Arc<dyn Fn(&HandlerError) -> anyhow::Result<Reply> + Send + Sync>;

/// Runs before dispatch; `Some` short-circuits the handler
pub type BeforeRequestHook = Arc<dyn Fn() -> anyhow::Result<Option<Reply>> + Send + Sync>;

/// Runs after dispatch; returns the (possibly replaced) response
pub type AfterRequestHook = Arc<dyn Fn(Response) -> anyhow::Result<Response> + Send + Sync>;

/// Handler, error-handler and lifecycle-hook registry.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    error_handlers: HashMap<u16, ErrorHandler>,
    before_request: Vec<BeforeRequestHook>,
    after_request: Vec<AfterRequestHook>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut endpoints: Vec<&String> = self.handlers.keys().collect();
        endpoints.sort();
        let mut codes: Vec<&u16> = self.error_handlers.keys().collect();
        codes.sort();
        f.debug_struct("Dispatcher")
            .field("handlers", &endpoints)
            .field("error_handlers", &codes)
            .field("before_request", &self.before_request.len())
            .field("after_request", &self.after_request.len())
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `endpoint`, replacing any previous handler.
    pub fn register_handler<F>(&mut self, endpoint: &str, handler: F)
    where
        F: Fn(&ViewArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        if self.handlers.insert(endpoint.to_string(), Arc::new(handler)).is_some() {
            warn!(endpoint = %endpoint, "Handler replaced");
        } else {
            debug!(endpoint = %endpoint, "Handler registered");
        }
    }

    #[must_use]
    pub fn has_handler(&self, endpoint: &str) -> bool {
        self.handlers.contains_key(endpoint)
    }

    /// Registered endpoints, sorted.
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn register_error_handler<F>(&mut self, status: u16, handler: F)
    where
        F: Fn(&HandlerError) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        debug!(status = status, "Error handler registered");
        self.error_handlers.insert(status, Arc::new(handler));
    }

    pub fn add_before_request<F>(&mut self, hook: F)
    where
        F: Fn() -> anyhow::Result<Option<Reply>> + Send + Sync + 'static,
    {
        self.before_request.push(Arc::new(hook));
    }

    pub fn add_after_request<F>(&mut self, hook: F)
    where
        F: Fn(Response) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.after_request.push(Arc::new(hook));
    }

    /// Run before-request hooks in registration order.
    ///
    /// # Errors
    ///
    /// A failing hook aborts the request with `DispatchError::BeforeRequest`.
    pub fn preprocess(&self, request_id: RequestId) -> Result<Option<Reply>, DispatchError> {
        for (index, hook) in self.before_request.iter().enumerate() {
            match guarded(request_id, "Before-request hook", || hook()) {
                Ok(Some(reply)) => {
                    info!(request_id = %request_id, hook_index = index, "Before-request hook short-circuited dispatch");
                    return Ok(Some(reply));
                }
                Ok(None) => {}
                Err(e) => {
                    error!(request_id = %request_id, hook_index = index, error = %e, "Before-request hook failed");
                    return Err(DispatchError::BeforeRequest(e));
                }
            }
        }
        Ok(None)
    }

    /// Invoke the handler bound to `endpoint`.
    ///
    /// The outer `Result` is fatal; the inner one is the handler's own
    /// outcome and goes through [`Dispatcher::handle_exception`]. A panic in
    /// the handler is reported as `HandlerError::Internal`.
    ///
    /// # Errors
    ///
    /// `DispatchError::UnregisteredEndpoint` when no handler is bound.
    pub fn invoke(
        &self,
        endpoint: &str,
        view_args: &ViewArgs,
        request_id: RequestId,
    ) -> Result<Result<Reply, HandlerError>, DispatchError> {
        let Some(handler) = self.handlers.get(endpoint) else {
            error!(request_id = %request_id, endpoint = %endpoint, "No handler registered for endpoint");
            return Err(DispatchError::UnregisteredEndpoint {
                endpoint: endpoint.to_string(),
            });
        };

        info!(
            request_id = %request_id,
            endpoint = %endpoint,
            view_args = ?view_args,
            "Handler execution start"
        );
        let start = Instant::now();

        let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(view_args))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let panic_message = panic_message(panic.as_ref());
                error!(
                    request_id = %request_id,
                    endpoint = %endpoint,
                    panic_message = %panic_message,
                    "Handler panicked"
                );
                Err(HandlerError::Internal(anyhow::anyhow!("handler panicked: {panic_message}")))
            }
        };

        info!(
            request_id = %request_id,
            endpoint = %endpoint,
            ok = outcome.is_ok(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Handler execution complete"
        );
        Ok(outcome)
    }

    /// Recover from a handler failure through the error-handler table.
    ///
    /// HTTP failures use the handler registered for their status, falling
    /// back to the failure's own rendering. Generic failures use the 500
    /// handler, but only outside debug mode.
    ///
    /// # Errors
    ///
    /// `Unhandled` for a generic failure that is not recovered, and
    /// `ErrorHandler` when the chosen error handler itself fails.
    pub fn handle_exception(
        &self,
        err: HandlerError,
        debug_mode: bool,
        request_id: RequestId,
    ) -> Result<Reply, DispatchError> {
        let status = err.status();
        match err {
            HandlerError::Http(http) => match self.error_handlers.get(&status) {
                Some(handler) => {
                    info!(request_id = %request_id, status = status, "Error handler selected");
                    guarded(request_id, "Error handler", || handler(&HandlerError::Http(http)))
                        .map_err(|source| DispatchError::ErrorHandler { status, source })
                }
                None => {
                    debug!(request_id = %request_id, status = status, "No error handler; using default rendering");
                    Ok(Reply::from(http))
                }
            },
            HandlerError::Internal(e) => {
                let handler = if debug_mode { None } else { self.error_handlers.get(&500) };
                match handler {
                    Some(handler) => {
                        warn!(request_id = %request_id, error = %e, "Handler failed; running 500 handler");
                        guarded(request_id, "Error handler", || handler(&HandlerError::Internal(e)))
                            .map_err(|source| DispatchError::ErrorHandler { status: 500, source })
                    }
                    None => {
                        error!(
                            request_id = %request_id,
                            error = %e,
                            debug = debug_mode,
                            "Handler failed without recovery"
                        );
                        Err(DispatchError::Unhandled(e))
                    }
                }
            }
        }
    }

    /// Run after-request hooks in registration order, each receiving the
    /// previous hook's response.
    ///
    /// # Errors
    ///
    /// A failing hook aborts the request with `DispatchError::AfterRequest`.
    pub fn process_response(&self, mut response: Response, request_id: RequestId) -> Result<Response, DispatchError> {
        for (index, hook) in self.after_request.iter().enumerate() {
            response = guarded(request_id, "After-request hook", || hook(response)).map_err(|e| {
                error!(request_id = %request_id, hook_index = index, error = %e, "After-request hook failed");
                DispatchError::AfterRequest(e)
            })?;
        }
        Ok(response)
    }
}

/// Run user code, turning a panic into an ordinary failure so hooks and
/// error handlers fail the same way handlers do.
fn guarded<T>(request_id: RequestId, what: &'static str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let panic_message = panic_message(panic.as_ref());
        error!(request_id = %request_id, panic_message = %panic_message, "{what} panicked");
        Err(anyhow::anyhow!("{what} panicked: {panic_message}"))
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
