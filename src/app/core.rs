use serde_json::Value;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::context::{self, ContextGuard, RequestContext};
use crate::dispatcher::{DispatchError, Dispatcher, HandlerError, Reply};
use crate::router::{Router, RuleError, RuleOptions, ViewArgs};
use crate::server::{AppService, CookieOptions, HttpServer, Request, Response, ServerHandle};
use crate::session::save_session;
use crate::templating::{TemplateContext, TemplateError, Templates};
use crate::testing::TestClient;

/// Supplies variables to every rendered template
pub type ContextProcessor = Arc<dyn Fn() -> TemplateContext + Send + Sync>;

/// The application: registry plus the per-request pipeline.
///
/// Set up with `&mut App`, then share it as `Arc<App>`; nothing changes
/// once requests are being served.
pub struct App {
    config: AppConfig,
    router: Router,
    dispatcher: Dispatcher,
    templates: Templates,
    context_processors: Vec<ContextProcessor>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("dispatcher", &self.dispatcher)
            .field("context_processors", &self.context_processors.len())
            .finish_non_exhaustive()
    }
}

/// Injects `request`, `session` and `g` from the current context.
fn default_context_processor() -> TemplateContext {
    let mut vars = TemplateContext::new();
    let Some(ctx) = context::top() else {
        return vars;
    };
    let request = ctx
        .with_request(|r| serde_json::to_value(r))
        .unwrap_or(Value::Null);
    let session = ctx
        .session()
        .and_then(|s| serde_json::to_value(s).ok())
        .unwrap_or(Value::Null);
    let g = serde_json::to_value(ctx.g()).unwrap_or(Value::Null);
    vars.insert("request".to_string(), request);
    vars.insert("session".to_string(), session);
    vars.insert("g".to_string(), g);
    vars
}

impl App {
    /// Create an application with the build-only `static` rule and the
    /// default context processor registered.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let templates = Templates::new(config.template_dir.as_deref());
        let mut app = Self {
            config,
            router: Router::new(),
            dispatcher: Dispatcher::new(),
            templates,
            context_processors: Vec::new(),
        };

        let static_rule = format!("{}/<path:filename>", app.config.static_path.trim_end_matches('/'));
        if let Err(e) = app.add_url_rule(&static_rule, "static", RuleOptions::new().build_only(true)) {
            warn!(static_path = %app.config.static_path, error = %e, "Static rule not registered");
        }
        app.context_processor(default_context_processor);

        info!(
            debug = app.config.debug,
            sessions = app.config.secret_key.is_some(),
            template_dir = ?app.config.template_dir,
            "Application created"
        );
        app
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.config.debug
    }

    // --- setup -----------------------------------------------------------

    /// # Errors
    ///
    /// The pattern does not compile.
    pub fn add_url_rule(&mut self, pattern: &str, endpoint: &str, options: RuleOptions) -> Result<(), RuleError> {
        self.router.add(pattern, endpoint, options)
    }

    pub fn register_handler<F>(&mut self, endpoint: &str, handler: F)
    where
        F: Fn(&ViewArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.register_handler(endpoint, handler);
    }

    /// Register a GET rule and its handler in one call.
    ///
    /// # Errors
    ///
    /// The pattern does not compile; the handler is not registered then.
    pub fn route<F>(&mut self, pattern: &str, endpoint: &str, handler: F) -> Result<(), RuleError>
    where
        F: Fn(&ViewArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.route_with(pattern, endpoint, RuleOptions::default(), handler)
    }

    /// # Errors
    ///
    /// The pattern does not compile; the handler is not registered then.
    pub fn route_with<F>(
        &mut self,
        pattern: &str,
        endpoint: &str,
        options: RuleOptions,
        handler: F,
    ) -> Result<(), RuleError>
    where
        F: Fn(&ViewArgs) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.add_url_rule(pattern, endpoint, options)?;
        self.register_handler(endpoint, handler);
        Ok(())
    }

    pub fn register_error_handler<F>(&mut self, status: u16, handler: F)
    where
        F: Fn(&HandlerError) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.dispatcher.register_error_handler(status, handler);
    }

    pub fn before_request<F>(&mut self, hook: F)
    where
        F: Fn() -> anyhow::Result<Option<Reply>> + Send + Sync + 'static,
    {
        self.dispatcher.add_before_request(hook);
    }

    pub fn after_request<F>(&mut self, hook: F)
    where
        F: Fn(Response) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        self.dispatcher.add_after_request(hook);
    }

    pub fn context_processor<F>(&mut self, processor: F)
    where
        F: Fn() -> TemplateContext + Send + Sync + 'static,
    {
        self.context_processors.push(Arc::new(processor));
    }

    /// # Errors
    ///
    /// Template syntax error.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.templates.add_template(name, source)
    }

    // --- request handling ------------------------------------------------

    /// Bind `request` to a fresh context without pushing it.
    #[must_use]
    pub fn request_context(self: &Arc<Self>, request: Request) -> Arc<RequestContext> {
        Arc::new(RequestContext::new(Arc::clone(self), request))
    }

    /// Push a context for `request` without dispatching it.
    ///
    /// The context stays current until the guard is dropped.
    pub fn test_request_context(self: &Arc<Self>, request: Request) -> ContextGuard {
        ContextGuard::push(self.request_context(request))
    }

    /// Serve one request.
    ///
    /// The context is pushed for the whole pipeline and popped on every exit
    /// path. In debug mode with `preserve_context_on_exception` a failed
    /// request leaves its context on the stack. A panic in a handler, hook
    /// or error handler counts as a failure of that step, so it is preserved
    /// the same way.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`]; the request produced no response.
    pub fn handle(self: &Arc<Self>, request: Request) -> Result<Response, DispatchError> {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let guard = self.test_request_context(request);
        let ctx = Arc::clone(guard.context());

        let result = self.full_dispatch(&ctx);

        match &result {
            Ok(response) => info!(
                request_id = %ctx.request_id(),
                method = %method,
                path = %path,
                status = response.status,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request complete"
            ),
            Err(e) => error!(
                request_id = %ctx.request_id(),
                method = %method,
                path = %path,
                error = %e,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request failed"
            ),
        }

        if result.is_err() && self.config.debug && self.config.preserve_context_on_exception {
            guard.preserve();
        } else {
            drop(guard);
        }
        result
    }

    fn full_dispatch(&self, ctx: &RequestContext) -> Result<Response, DispatchError> {
        let reply = match self.preprocess_request(ctx)? {
            Some(reply) => reply,
            None => self.dispatch_request(ctx)?,
        };
        let response = self.make_response(ctx, reply)?;
        self.process_response(ctx, response)
    }

    /// Run the before-request hooks.
    ///
    /// # Errors
    ///
    /// `DispatchError::BeforeRequest` from a failing hook.
    pub fn preprocess_request(&self, ctx: &RequestContext) -> Result<Option<Reply>, DispatchError> {
        self.dispatcher.preprocess(ctx.request_id())
    }

    /// Route the request, invoke its handler and recover from failures.
    ///
    /// # Errors
    ///
    /// Unregistered endpoints, unrecovered generic failures and failing
    /// error handlers.
    pub fn dispatch_request(&self, ctx: &RequestContext) -> Result<Reply, DispatchError> {
        let request_id = ctx.request_id();
        let outcome = match ctx.match_request() {
            Ok(route) => self
                .dispatcher
                .invoke(&route.endpoint, &route.view_args, request_id)?,
            Err(routing) => {
                debug!(request_id = %request_id, status = routing.status(), "Routing failed");
                Err(HandlerError::from(routing))
            }
        };
        match outcome {
            Ok(reply) => Ok(reply),
            Err(e) => self.dispatcher.handle_exception(e, self.config.debug, request_id),
        }
    }

    /// Coerce a handler result into a response.
    ///
    /// # Errors
    ///
    /// `DispatchError::Coercion` when a foreign value has no response form.
    pub fn make_response(&self, ctx: &RequestContext, reply: Reply) -> Result<Response, DispatchError> {
        let request = ctx.request();
        Ok(reply.into_response(&request)?)
    }

    /// Save the session and run the after-request hooks.
    ///
    /// # Errors
    ///
    /// `DispatchError::AfterRequest` from a failing hook.
    pub fn process_response(&self, ctx: &RequestContext, mut response: Response) -> Result<Response, DispatchError> {
        let options = CookieOptions {
            path: self.config.session_cookie_path.clone(),
            http_only: self.config.session_cookie_httponly,
            ..CookieOptions::default()
        };
        let saved = save_session(
            ctx.session().as_ref(),
            &mut response,
            &self.config.session_cookie_name,
            self.config.secret_key.as_deref(),
            &options,
        );
        if saved {
            debug!(request_id = %ctx.request_id(), "Session saved");
        }
        self.dispatcher.process_response(response, ctx.request_id())
    }

    // --- templates -------------------------------------------------------

    /// Merge processor output in registration order, then `explicit`.
    #[must_use]
    pub fn update_template_context(&self, explicit: TemplateContext) -> TemplateContext {
        let mut merged = TemplateContext::new();
        for processor in &self.context_processors {
            merged.extend(processor());
        }
        merged.extend(explicit);
        merged
    }

    /// # Errors
    ///
    /// Unknown template or evaluation failure.
    pub fn render_template(&self, name: &str, ctx: TemplateContext) -> Result<String, TemplateError> {
        let vars = self.update_template_context(ctx);
        self.templates.render(name, &vars)
    }

    /// # Errors
    ///
    /// Syntax or evaluation failure.
    pub fn render_template_string(&self, source: &str, ctx: TemplateContext) -> Result<String, TemplateError> {
        let vars = self.update_template_context(ctx);
        self.templates.render_str(source, &vars)
    }

    // --- entry points ----------------------------------------------------

    #[must_use]
    pub fn test_client(self: &Arc<Self>) -> TestClient {
        TestClient::new(Arc::clone(self))
    }

    /// Start serving on `addr` with the configured coroutine stack size.
    ///
    /// # Errors
    ///
    /// The address cannot be resolved or bound.
    pub fn run<A: ToSocketAddrs>(self: &Arc<Self>, addr: A) -> io::Result<ServerHandle> {
        may::config().set_stack_size(self.config.stack_size);
        info!(
            stack_size = self.config.stack_size,
            routes = self.router.rules().len(),
            "Starting server"
        );
        HttpServer(AppService::new(Arc::clone(self))).start(addr)
    }
}
