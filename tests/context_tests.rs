mod common;

use common::{debug_config, setup_may_runtime};
use flagon::app::App;
use flagon::config::AppConfig;
use flagon::context::{self, ContextError};
use flagon::dispatcher::{DispatchError, Reply};
use flagon::router::BuildError;
use flagon::server::Request;
use std::sync::Arc;

fn g_echo_app() -> Arc<App> {
    let mut app = App::new(AppConfig::default());
    app.route("/echo/<int:id>", "echo", |args| {
        let id: u64 = args.parse("id").unwrap_or(0);
        context::with_g(|g| g.set("id", id))?.map_err(anyhow::Error::from)?;
        may::coroutine::yield_now();
        let seen: Option<u64> = context::with_g(|g| g.get_as("id"))?;
        let path = context::with_request(|r| r.path.clone())?;
        Ok(Reply::from(format!("{}|{}", seen.unwrap_or(u64::MAX), path)))
    })
    .unwrap();
    app.into_shared()
}

#[test]
fn test_accessors_fail_outside_context() {
    assert_eq!(context::depth(), 0);
    assert!(context::top().is_none());
    assert_eq!(context::current_app().unwrap_err(), ContextError::OutsideRequestContext);
    assert_eq!(context::with_request(|_| ()).unwrap_err(), ContextError::OutsideRequestContext);
    assert_eq!(context::with_g(|_| ()).unwrap_err(), ContextError::OutsideRequestContext);
    assert_eq!(context::url_for("x", &[]).unwrap_err(), ContextError::OutsideRequestContext);
    assert!(context::render_template_string("x", Default::default()).is_err());
}

#[test]
fn test_request_context_guard_pushes_and_pops() {
    let app = App::new(AppConfig::default()).into_shared();
    {
        let guard = app.test_request_context(Request::get("/a?q=1"));
        assert_eq!(context::depth(), 1);
        let top = context::top().unwrap();
        assert_eq!(top.request_id(), guard.context().request_id());
        assert_eq!(context::with_request(|r| r.arg("q").map(str::to_string)).unwrap().as_deref(), Some("1"));
        assert!(Arc::ptr_eq(&context::current_app().unwrap(), &app));
    }
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_nested_contexts_unwind_in_order() {
    let app = App::new(AppConfig::default()).into_shared();
    let outer = app.test_request_context(Request::get("/outer"));
    {
        let _inner = app.test_request_context(Request::get("/inner"));
        assert_eq!(context::with_request(|r| r.path.clone()).unwrap(), "/inner");
        assert_eq!(context::depth(), 2);
    }
    assert_eq!(context::with_request(|r| r.path.clone()).unwrap(), "/outer");
    drop(outer);
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_pop_checks_identity() {
    let app = App::new(AppConfig::default()).into_shared();
    let guard = app.test_request_context(Request::get("/"));
    let stranger = app.request_context(Request::get("/other"));
    let err = context::pop(&stranger).unwrap_err();
    assert!(matches!(err, ContextError::StackMismatch { found: Some(_), .. }));
    assert_eq!(context::depth(), 1);
    drop(guard);
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_pop_ignores_shared_request_ids() {
    let app = App::new(AppConfig::default()).into_shared();
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let outer = app.test_request_context(Request::get("/a").with_header("X-Request-Id", id));
    let twin = app.request_context(Request::get("/b").with_header("X-Request-Id", id));
    assert_eq!(outer.context().request_id(), twin.request_id());

    context::push(Arc::clone(&twin));
    let err = context::pop(outer.context()).unwrap_err();
    assert!(matches!(err, ContextError::StackMismatch { .. }));
    assert_eq!(context::depth(), 2);

    let popped = context::pop(&twin).unwrap();
    assert!(Arc::ptr_eq(&popped, &twin));
    drop(outer);
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_g_starts_empty_for_each_request() {
    let mut app = App::new(AppConfig::default());
    app.route("/", "index", |_| {
        let was_empty = context::with_g(|g| g.is_empty())?;
        context::with_g(|g| g.set("x", 1))?.map_err(anyhow::Error::from)?;
        Ok(Reply::from(was_empty.to_string()))
    })
    .unwrap();
    let app = app.into_shared();
    assert_eq!(app.handle(Request::get("/")).unwrap().body_text(), "true");
    assert_eq!(app.handle(Request::get("/")).unwrap().body_text(), "true");
}

#[test]
fn test_g_isolated_across_coroutines() {
    setup_may_runtime();
    let app = g_echo_app();
    let handles: Vec<_> = (0..64u64)
        .map(|i| {
            let app = Arc::clone(&app);
            may::go!(move || {
                let response = app.handle(Request::get(&format!("/echo/{i}"))).unwrap();
                (i, response.body_text().into_owned(), context::depth())
            })
        })
        .collect();
    for handle in handles {
        let (i, body, depth) = handle.join().unwrap();
        assert_eq!(body, format!("{i}|/echo/{i}"));
        assert_eq!(depth, 0);
    }
}

#[test]
fn test_g_isolated_across_threads() {
    let app = g_echo_app();
    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let app = Arc::clone(&app);
            std::thread::spawn(move || {
                let mut bodies = Vec::new();
                for j in 0..20 {
                    let id = i * 100 + j;
                    let body = app
                        .handle(Request::get(&format!("/echo/{id}")))
                        .unwrap()
                        .body_text()
                        .into_owned();
                    bodies.push((id, body));
                }
                bodies
            })
        })
        .collect();
    for handle in handles {
        for (id, body) in handle.join().unwrap() {
            assert_eq!(body, format!("{id}|/echo/{id}"));
        }
    }
}

#[test]
fn test_debug_mode_preserves_context_after_failure() {
    let mut app = App::new(debug_config());
    app.route("/boom", "boom", |_| {
        context::with_g(|g| g.set("stage", "handler"))?.map_err(anyhow::Error::from)?;
        Err(anyhow::anyhow!("boom").into())
    })
    .unwrap();
    app.register_error_handler(500, |_| Ok(Reply::from("never in debug")));
    let app = app.into_shared();

    let err = app.handle(Request::get("/boom")).unwrap_err();
    assert!(matches!(err, DispatchError::Unhandled(_)));

    assert_eq!(context::depth(), 1);
    let leaked = context::top().unwrap();
    assert_eq!(leaked.with_request(|r| r.path.clone()), "/boom");
    assert_eq!(leaked.g().get_as::<String>("stage").as_deref(), Some("handler"));

    context::pop(&leaked).unwrap();
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_recovered_failure_pops_context_even_in_debug() {
    let mut app = App::new(debug_config());
    app.route("/missing-item", "item", |_| Err(flagon::abort(404))).unwrap();
    let app = app.into_shared();
    let response = app.handle(Request::get("/missing-item")).unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_non_debug_failure_pops_context() {
    let mut app = App::new(AppConfig::default());
    app.route("/boom", "boom", |_| Err(anyhow::anyhow!("boom").into()))
        .unwrap();
    let app = app.into_shared();
    assert!(app.handle(Request::get("/boom")).is_err());
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_panicking_hook_fails_request_and_pops_context() {
    let mut app = App::new(AppConfig::default());
    app.route("/", "index", |_| Ok(Reply::from("ok"))).unwrap();
    app.after_request(|_| panic!("after hook exploded"));
    let app = app.into_shared();
    let err = app.handle(Request::get("/")).unwrap_err();
    assert!(matches!(err, DispatchError::AfterRequest(_)));
    assert!(err.to_string().contains("after hook exploded"));
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_debug_mode_preserves_context_after_hook_panic() {
    let mut app = App::new(debug_config());
    app.route("/", "index", |_| Ok(Reply::from("ok"))).unwrap();
    app.before_request(|| panic!("before hook exploded"));
    let app = app.into_shared();
    let err = app.handle(Request::get("/")).unwrap_err();
    assert!(matches!(err, DispatchError::BeforeRequest(_)));

    assert_eq!(context::depth(), 1);
    let leaked = context::top().unwrap();
    context::pop(&leaked).unwrap();
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_url_for_inside_context() {
    let mut app = App::new(AppConfig::default());
    app.route("/user/<int:id>", "user", |_| Ok(Reply::from(""))).unwrap();
    let app = app.into_shared();
    let _guard = app.test_request_context(Request::get("/"));

    assert_eq!(context::url_for("user", &[("id", "7"), ("tab", "a b")]).unwrap(), "/user/7?tab=a+b");
    assert_eq!(
        context::url_for("static", &[("filename", "css/site.css")]).unwrap(),
        "/static/css/site.css"
    );
    assert!(matches!(
        context::url_for("nowhere", &[]).unwrap_err(),
        ContextError::Build(BuildError::UnknownEndpoint { .. })
    ));
}

#[test]
fn test_static_rule_is_build_only() {
    let app = App::new(AppConfig::default()).into_shared();
    let response = app.handle(Request::get("/static/site.css")).unwrap();
    assert_eq!(response.status, 404);
}
