mod common;

use common::{debug_config, setup_may_runtime};
use flagon::app::App;
use flagon::config::AppConfig;
use flagon::context;
use flagon::dispatcher::{abort, DispatchError, HandlerError, HeaderVec, Reply};
use flagon::router::RuleOptions;
use flagon::server::Request;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn hello_app(config: AppConfig) -> App {
    let mut app = App::new(config);
    app.route("/hello/<name>", "hello", |args| {
        Ok(Reply::from(format!("Hello {}", args.get("name").unwrap_or(""))))
    })
    .unwrap();
    app
}

#[test]
fn test_route_dispatch_with_params() {
    setup_may_runtime();
    let app = hello_app(AppConfig::default()).into_shared();
    let response = app.handle(Request::get("/hello/World")).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "Hello World");
    assert_eq!(response.mimetype(), Some("text/html"));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_endpoint_and_view_args_recorded_on_request() {
    let mut app = App::new(AppConfig::default());
    app.route("/post/<int:year>/<slug>", "post", |_| {
        let (endpoint, slug) = context::with_request(|r| {
            (
                r.endpoint.clone().unwrap_or_default(),
                r.view_args.as_ref().and_then(|v| v.get("slug").map(str::to_string)),
            )
        })?;
        Ok(Reply::from(format!("{endpoint}:{}", slug.unwrap_or_default())))
    })
    .unwrap();
    let app = app.into_shared();
    let response = app.handle(Request::get("/post/2024/hello-world")).unwrap();
    assert_eq!(response.body_text(), "post:hello-world");
}

#[test]
fn test_not_found_uses_registered_handler() {
    let mut app = hello_app(AppConfig::default());
    app.register_error_handler(404, |err| {
        assert_eq!(err.status(), 404);
        Ok(Reply::from(("custom missing", 404)))
    });
    let app = app.into_shared();
    let response = app.handle(Request::get("/nope")).unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body_text(), "custom missing");
}

#[test]
fn test_not_found_default_rendering() {
    let app = hello_app(AppConfig::default()).into_shared();
    let response = app.handle(Request::get("/nope")).unwrap();
    assert_eq!(response.status, 404);
    assert!(response.body_text().contains("Not Found"));
}

#[test]
fn test_method_not_allowed_lists_methods() {
    let app = hello_app(AppConfig::default()).into_shared();
    let response = app.handle(Request::post("/hello/x")).unwrap();
    assert_eq!(response.status, 405);
    assert_eq!(response.header("allow"), Some("GET, HEAD"));
}

#[test]
fn test_head_is_served_by_get_rule() {
    let app = hello_app(AppConfig::default()).into_shared();
    let response = app.handle(Request::new(Method::HEAD, "/hello/x")).unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn test_trailing_slash_redirect() {
    let mut app = App::new(AppConfig::default());
    app.route("/docs/", "docs", |_| Ok(Reply::from("docs"))).unwrap();
    let app = app.into_shared();
    let response = app.handle(Request::get("/docs")).unwrap();
    assert_eq!(response.status, 301);
    assert_eq!(response.header("location"), Some("/docs/"));
}

#[test]
fn test_abort_goes_through_error_handler_table() {
    let mut app = App::new(AppConfig::default());
    app.route("/admin", "admin", |_| Err(abort(403))).unwrap();
    app.register_error_handler(403, |_| Ok(Reply::from(("go away", 403))));
    let app = app.into_shared();
    let response = app.handle(Request::get("/admin")).unwrap();
    assert_eq!(response.status, 403);
    assert_eq!(response.body_text(), "go away");
}

#[test]
fn test_before_request_short_circuits_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut app = App::new(AppConfig::default());
    let counter = Arc::clone(&calls);
    app.route("/x", "x", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Reply::from("handler"))
    })
    .unwrap();
    app.before_request(|| Ok(Some(Reply::from("Blocked"))));
    app.before_request(|| panic!("second hook must not run"));
    let app = app.into_shared();

    let response = app.handle(Request::get("/x")).unwrap();
    assert_eq!(response.body_text(), "Blocked");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_before_request_none_continues() {
    let mut app = hello_app(AppConfig::default());
    app.before_request(|| {
        context::with_g(|g| g.set("user", "ann"))?.map_err(anyhow::Error::from)?;
        Ok(None)
    });
    app.route("/me", "me", |_| {
        let user: Option<String> = context::with_g(|g| g.get_as("user"))?;
        Ok(Reply::from(user.unwrap_or_default()))
    })
    .unwrap();
    let app = app.into_shared();
    assert_eq!(app.handle(Request::get("/me")).unwrap().body_text(), "ann");
}

#[test]
fn test_after_request_hooks_compose_in_order() {
    let mut app = hello_app(AppConfig::default());
    app.after_request(|mut r| {
        r.set_header("x-order", "a".to_string());
        Ok(r)
    });
    app.after_request(|mut r| {
        let prev = r.header("x-order").unwrap_or("").to_string();
        r.set_header("x-order", format!("{prev}b"));
        Ok(r)
    });
    let app = app.into_shared();
    let response = app.handle(Request::get("/hello/x")).unwrap();
    assert_eq!(response.header("x-order"), Some("ab"));
}

#[test]
fn test_after_request_runs_on_error_responses() {
    let mut app = hello_app(AppConfig::default());
    app.after_request(|mut r| {
        r.set_header("x-seen", "1".to_string());
        Ok(r)
    });
    let app = app.into_shared();
    let response = app.handle(Request::get("/missing")).unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.header("x-seen"), Some("1"));
}

#[test]
fn test_reply_coercions() {
    let mut app = App::new(AppConfig::default());
    app.route("/tuple", "tuple", |_| {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("x-a"), "1".to_string()));
        Ok(Reply::from(("made", 201, headers)))
    })
    .unwrap();
    app.route("/json", "json", |_| Ok(Reply::from(json!({"ok": true}))))
        .unwrap();
    app.route("/scalar", "scalar", |_| Ok(Reply::from(json!(3))))
        .unwrap();
    let app = app.into_shared();

    let r = app.handle(Request::get("/tuple")).unwrap();
    assert_eq!((r.status, r.header("x-a")), (201, Some("1")));

    let r = app.handle(Request::get("/json")).unwrap();
    assert_eq!(r.json_body(), Some(json!({"ok": true})));

    let err = app.handle(Request::get("/scalar")).unwrap_err();
    assert!(matches!(err, DispatchError::Coercion(_)));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_generic_failure_recovered_by_500_handler() {
    let mut app = App::new(AppConfig::default());
    app.route("/boom", "boom", |_| Err(anyhow::anyhow!("boom").into()))
        .unwrap();
    app.register_error_handler(500, |err| {
        assert!(matches!(err, HandlerError::Internal(_)));
        Ok(Reply::from(("recovered", 500)))
    });
    let app = app.into_shared();
    let response = app.handle(Request::get("/boom")).unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "recovered");
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_handler_panic_is_a_generic_failure() {
    let mut app = App::new(AppConfig::default());
    app.route("/panic", "panic", |_| panic!("handler exploded"))
        .unwrap();
    app.register_error_handler(500, |err| Ok(Reply::from((err.to_string(), 500))));
    let app = app.into_shared();
    let response = app.handle(Request::get("/panic")).unwrap();
    assert_eq!(response.status, 500);
    assert!(response.body_text().contains("handler exploded"));
}

#[test]
fn test_generic_failure_without_500_handler_propagates() {
    let mut app = App::new(AppConfig::default());
    app.route("/boom", "boom", |_| Err(anyhow::anyhow!("boom").into()))
        .unwrap();
    let app = app.into_shared();
    let err = app.handle(Request::get("/boom")).unwrap_err();
    assert!(matches!(err, DispatchError::Unhandled(_)));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_unregistered_endpoint_is_fatal() {
    let mut app = App::new(AppConfig::default());
    app.add_url_rule("/orphan", "orphan", RuleOptions::default())
        .unwrap();
    app.register_error_handler(500, |_| Ok(Reply::from("should not run")));
    let app = app.into_shared();
    let err = app.handle(Request::get("/orphan")).unwrap_err();
    assert!(matches!(err, DispatchError::UnregisteredEndpoint { ref endpoint } if endpoint == "orphan"));
}

#[test]
fn test_failing_error_handler_propagates() {
    let mut app = hello_app(AppConfig::default());
    app.register_error_handler(404, |_| Err(anyhow::anyhow!("handler broke")));
    let app = app.into_shared();
    let err = app.handle(Request::get("/nope")).unwrap_err();
    assert!(matches!(err, DispatchError::ErrorHandler { status: 404, .. }));
}

#[test]
fn test_panicking_error_handler_propagates() {
    let mut app = hello_app(AppConfig::default());
    app.register_error_handler(404, |_| panic!("error handler exploded"));
    let app = app.into_shared();
    let err = app.handle(Request::get("/nope")).unwrap_err();
    assert!(matches!(err, DispatchError::ErrorHandler { status: 404, .. }));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_hook_failures_propagate() {
    let mut app = hello_app(AppConfig::default());
    app.before_request(|| Err(anyhow::anyhow!("denied")));
    let app = app.into_shared();
    assert!(matches!(
        app.handle(Request::get("/hello/x")).unwrap_err(),
        DispatchError::BeforeRequest(_)
    ));

    let mut app = hello_app(AppConfig::default());
    app.after_request(|_| Err(anyhow::anyhow!("late")));
    let app = app.into_shared();
    assert!(matches!(
        app.handle(Request::get("/hello/x")).unwrap_err(),
        DispatchError::AfterRequest(_)
    ));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_debug_mode_skips_500_handler() {
    let mut app = App::new(AppConfig {
        preserve_context_on_exception: false,
        ..debug_config()
    });
    app.route("/boom", "boom", |_| Err(anyhow::anyhow!("boom").into()))
        .unwrap();
    app.register_error_handler(500, |_| Ok(Reply::from("recovered")));
    let app = app.into_shared();
    let err = app.handle(Request::get("/boom")).unwrap_err();
    assert!(matches!(err, DispatchError::Unhandled(_)));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_debug_mode_still_uses_http_error_handlers() {
    let mut app = hello_app(debug_config());
    app.register_error_handler(404, |_| Ok(Reply::from(("custom", 404))));
    let app = app.into_shared();
    let response = app.handle(Request::get("/missing")).unwrap();
    assert_eq!(response.body_text(), "custom");
}
