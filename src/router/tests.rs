use super::{BuildError, Router, RoutingError, RuleError, RuleOptions};
use http::Method;

fn router() -> Router {
    let mut r = Router::new();
    r.add("/", "index", RuleOptions::default()).unwrap();
    r.add("/pets/<int:id>", "get_pet", RuleOptions::default()).unwrap();
    r.add(
        "/pets",
        "add_pet",
        RuleOptions::new().methods([Method::POST]),
    )
    .unwrap();
    r.add("/users/<name>/posts/<post>", "get_post", RuleOptions::default())
        .unwrap();
    r.add("/files/<path:file>", "files", RuleOptions::default())
        .unwrap();
    r.add("/docs/", "docs", RuleOptions::default()).unwrap();
    r.add(
        "/static/<filename>",
        "static",
        RuleOptions::new().build_only(true),
    )
    .unwrap();
    r
}

#[test]
fn test_root_path() {
    let m = router().bind("/", "", Method::GET).match_request().unwrap();
    assert_eq!(m.endpoint, "index");
    assert!(m.view_args.is_empty());
}

#[test]
fn test_int_converter_captures() {
    let m = router()
        .bind("/pets/42", "", Method::GET)
        .match_request()
        .unwrap();
    assert_eq!(m.endpoint, "get_pet");
    assert_eq!(m.view_args.parse::<u32>("id"), Some(42));
}

#[test]
fn test_int_converter_rejects_text() {
    let err = router()
        .bind("/pets/abc", "", Method::GET)
        .match_request()
        .unwrap_err();
    assert_eq!(err, RoutingError::NotFound);
}

#[test]
fn test_float_converter() {
    let mut r = Router::new();
    r.add("/price/<float:amount>", "price", RuleOptions::default())
        .unwrap();
    let m = r
        .bind("/price/12.50", "", Method::GET)
        .match_request()
        .unwrap();
    assert_eq!(m.view_args.parse::<f64>("amount"), Some(12.5));
    for path in ["/price/12", "/price/.5", "/price/1.2.3"] {
        let err = r.bind(path, "", Method::GET).match_request().unwrap_err();
        assert_eq!(err, RoutingError::NotFound, "{path}");
    }

    let adapter = r.bind("/", "", Method::GET);
    assert_eq!(adapter.build("price", &[("amount", "3.25")]).unwrap(), "/price/3.25");
    assert!(matches!(
        adapter.build("price", &[("amount", "3")]),
        Err(BuildError::InvalidValue { .. })
    ));
}

#[test]
fn test_nested_params_are_decoded() {
    let m = router()
        .bind("/users/ann%20lee/posts/p1", "", Method::GET)
        .match_request()
        .unwrap();
    assert_eq!(m.view_args.get("name"), Some("ann lee"));
    assert_eq!(m.view_args.get("post"), Some("p1"));
}

#[test]
fn test_path_converter_spans_slashes() {
    let m = router()
        .bind("/files/a/b/c.txt", "", Method::GET)
        .match_request()
        .unwrap();
    assert_eq!(m.view_args.get("file"), Some("a/b/c.txt"));
}

#[test]
fn test_head_allowed_with_get() {
    let m = router()
        .bind("/pets/1", "", Method::HEAD)
        .match_request()
        .unwrap();
    assert_eq!(m.endpoint, "get_pet");
}

#[test]
fn test_method_not_allowed_lists_methods() {
    let err = router()
        .bind("/pets", "", Method::GET)
        .match_request()
        .unwrap_err();
    assert_eq!(
        err,
        RoutingError::MethodNotAllowed {
            allowed: vec![Method::POST]
        }
    );
    assert_eq!(err.status(), 405);
}

#[test]
fn test_build_only_rules_never_match() {
    let err = router()
        .bind("/static/app.css", "", Method::GET)
        .match_request()
        .unwrap_err();
    assert_eq!(err, RoutingError::NotFound);
}

#[test]
fn test_missing_trailing_slash_redirects() {
    let err = router()
        .bind("/docs", "", Method::GET)
        .match_request()
        .unwrap_err();
    assert_eq!(
        err,
        RoutingError::RequestRedirect {
            location: "/docs/".to_string()
        }
    );
}

#[test]
fn test_build_roundtrips_and_appends_query() {
    let adapter = router().bind("/", "", Method::GET);
    assert_eq!(adapter.build("get_pet", &[("id", "9")]).unwrap(), "/pets/9");
    assert_eq!(
        adapter
            .build("static", &[("filename", "site.css"), ("v", "2")])
            .unwrap(),
        "/static/site.css?v=2"
    );
    assert_eq!(
        adapter.build("files", &[("file", "a b/c")]).unwrap(),
        "/files/a%20b/c"
    );
}

#[test]
fn test_build_errors() {
    let adapter = router().bind("/", "", Method::GET);
    assert!(matches!(
        adapter.build("nope", &[]),
        Err(BuildError::UnknownEndpoint { .. })
    ));
    assert!(matches!(
        adapter.build("get_pet", &[]),
        Err(BuildError::MissingParameters { missing, .. }) if missing == vec!["id".to_string()]
    ));
    assert!(matches!(
        adapter.build("get_pet", &[("id", "x")]),
        Err(BuildError::InvalidValue { .. })
    ));
}

#[test]
fn test_bad_patterns_rejected() {
    let mut r = Router::new();
    assert!(matches!(
        r.add("nope", "x", RuleOptions::default()),
        Err(RuleError::MissingLeadingSlash { .. })
    ));
    assert!(matches!(
        r.add("/<uuid:x>", "x", RuleOptions::default()),
        Err(RuleError::UnknownConverter { .. })
    ));
    assert!(matches!(
        r.add("/<a>/<a>", "x", RuleOptions::default()),
        Err(RuleError::DuplicateParameter { .. })
    ));
    assert!(r.rules().is_empty());
}
