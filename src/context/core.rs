use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use super::error::ContextError;
use super::stack;
use crate::app::App;
use crate::ids::RequestId;
use crate::router::{MapAdapter, RouteMatch, RoutingError};
use crate::server::Request;
use crate::session::{open_session, Session};

/// Per-request scratch space, empty when the context is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Globals {
    values: Map<String, Value>,
}

impl Globals {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> serde_json::Result<()> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Globals {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// Everything bound to one request while it is being served.
///
/// Exclusively owned by the serving call; shared with user code only
/// through the stack accessors.
pub struct RequestContext {
    app: Arc<App>,
    request_id: RequestId,
    url_adapter: MapAdapter,
    request: RwLock<Request>,
    session: Mutex<Option<Session>>,
    g: Mutex<Globals>,
    flashes: Mutex<Option<Vec<String>>>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("url_adapter", &self.url_adapter)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Bind `request` to `app`: routing adapter, session and empty `g`.
    #[must_use]
    pub fn new(app: Arc<App>, request: Request) -> Self {
        let config = app.config();
        let url_adapter = app
            .router()
            .bind(&request.path, &request.host, request.method.clone());
        let session = open_session(
            &request,
            &config.session_cookie_name,
            config.secret_key.as_deref(),
        );
        Self {
            request_id: request.request_id,
            url_adapter,
            request: RwLock::new(request),
            session: Mutex::new(session),
            g: Mutex::new(Globals::default()),
            flashes: Mutex::new(None),
            app,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    #[must_use]
    pub fn url_adapter(&self) -> &MapAdapter {
        &self.url_adapter
    }

    pub fn with_request<R>(&self, f: impl FnOnce(&Request) -> R) -> R {
        let request = self.request.read().unwrap_or_else(PoisonError::into_inner);
        f(&request)
    }

    /// A copy of the request as it currently stands.
    #[must_use]
    pub fn request(&self) -> Request {
        self.with_request(Request::clone)
    }

    /// Match the bound request and record the result on it.
    ///
    /// # Errors
    ///
    /// The routing failure, unchanged.
    pub fn match_request(&self) -> Result<RouteMatch, RoutingError> {
        let route = self.url_adapter.match_request()?;
        let mut request = self.request.write().unwrap_or_else(PoisonError::into_inner);
        request.endpoint = Some(route.endpoint.clone());
        request.view_args = Some(route.view_args.clone());
        Ok(route)
    }

    /// # Errors
    ///
    /// `SessionUnavailable` when the application has no secret key.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Result<R, ContextError> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match session.as_mut() {
            Some(s) => Ok(f(s)),
            None => Err(ContextError::SessionUnavailable),
        }
    }

    /// A copy of the session, `None` without a secret key.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn with_g<R>(&self, f: impl FnOnce(&mut Globals) -> R) -> R {
        let mut g = self.g.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    #[must_use]
    pub fn g(&self) -> Globals {
        self.with_g(|g| g.clone())
    }

    /// Queue a message for the next request that reads flashes.
    ///
    /// # Errors
    ///
    /// `SessionUnavailable` when the application has no secret key.
    pub fn flash(&self, message: &str) -> Result<(), ContextError> {
        self.with_session(|s| s.push_flash(message))?;
        debug!(request_id = %self.request_id, "Message flashed");
        Ok(())
    }

    /// Pop the pending flash messages.
    ///
    /// The first call removes them from the session and caches them on the
    /// context; later calls in the same context return the cache. Without a
    /// session there is nothing to pop and the list is empty.
    #[must_use]
    pub fn get_flashed_messages(&self) -> Vec<String> {
        let mut cache = self.flashes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            return cached.clone();
        }
        let messages = self.with_session(Session::take_flashes).unwrap_or_default();
        *cache = Some(messages.clone());
        messages
    }

    /// Build a URL for `endpoint` against this request's adapter.
    ///
    /// # Errors
    ///
    /// `ContextError::Build` with the router's failure.
    pub fn url_for(&self, endpoint: &str, values: &[(&str, &str)]) -> Result<String, ContextError> {
        Ok(self.url_adapter.build(endpoint, values)?)
    }
}

/// Keeps a context on the stack for as long as it lives.
///
/// Dropping the guard pops the context, including during unwinding.
/// [`ContextGuard::preserve`] leaves it in place instead.
#[derive(Debug)]
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ContextGuard {
    ctx: Arc<RequestContext>,
    preserved: bool,
}

impl ContextGuard {
    /// Push `ctx` and return the guard that pops it.
    pub fn push(ctx: Arc<RequestContext>) -> Self {
        stack::push(Arc::clone(&ctx));
        Self {
            ctx,
            preserved: false,
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<RequestContext> {
        &self.ctx
    }

    /// Leave the context on the stack for post-mortem inspection.
    pub fn preserve(mut self) {
        self.preserved = true;
        info!(
            request_id = %self.ctx.request_id(),
            depth = stack::depth(),
            "Request context preserved after failure"
        );
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.preserved {
            return;
        }
        if let Err(e) = stack::pop(&self.ctx) {
            warn!(request_id = %self.ctx.request_id(), error = %e, "Request context was not popped");
        }
    }
}
