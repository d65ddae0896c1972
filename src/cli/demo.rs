use serde_json::json;
use tracing::info;

use crate::app::App;
use crate::config::AppConfig;
use crate::context;
use crate::dispatcher::{abort, redirect, HandlerError, Reply};
use crate::router::RuleOptions;
use crate::templating::TemplateContext;

const LAYOUT: &str = r#"<!doctype html>
<title>flagon demo</title>
{% for message in get_flashed_messages() %}<p class="flash">{{ message }}</p>{% endfor %}
{% block body %}{% endblock %}"#;

const INDEX: &str = r#"{% extends "layout.html" %}
{% block body %}
<h1>Hello{% if session and session.name %}, {{ session.name }}{% endif %}!</h1>
<p>You have visited {{ visits }} time{% if visits != 1 %}s{% endif %}.</p>
<form method="post" action="{{ url_for('login') }}"><input name="name"><button>Log in</button></form>
{% endblock %}"#;

fn vars(value: serde_json::Value) -> TemplateContext {
    match value {
        serde_json::Value::Object(map) => map,
        _ => TemplateContext::new(),
    }
}

/// The application served by `flagon serve`.
///
/// # Errors
///
/// A rule or template fails to register.
pub fn demo_app(config: AppConfig) -> anyhow::Result<App> {
    let mut app = App::new(config);
    app.add_template("layout.html", LAYOUT)?;
    app.add_template("index.html", INDEX)?;

    app.route("/", "index", |_| {
        let visits = context::with_session(|s| {
            let visits = s.get_as::<u64>("visits").unwrap_or(0) + 1;
            s.insert("visits", visits).map(|()| visits)
        });
        let visits = match visits {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(HandlerError::Internal(e.into())),
            Err(_) => 0,
        };
        let body = context::render_template("index.html", vars(json!({ "visits": visits })))?;
        Ok(Reply::from(body))
    })?;

    app.route_with(
        "/login",
        "login",
        RuleOptions::new().methods([http::Method::POST]),
        |_| {
            let name = context::with_request(|r| r.form().get("name").cloned())?
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| abort(400))?;
            context::with_session(|s| s.insert("name", &name))?.map_err(anyhow::Error::from)?;
            context::flash(&format!("Logged in as {name}"))?;
            Ok(Reply::from(redirect(&context::url_for("index", &[])?)))
        },
    )?;

    app.route("/hello/<name>", "hello", |args| {
        let name = args.get("name").unwrap_or("stranger");
        Ok(Reply::from(json!({ "hello": name })))
    })?;

    app.route("/items/<int:id>", "item", |args| {
        let id: u64 = args.parse("id").ok_or_else(|| abort(404))?;
        if id == 0 {
            return Err(abort(404));
        }
        Ok(Reply::from(format!("item {id}")))
    })?;

    app.register_error_handler(404, |_| {
        Ok(Reply::from(("<h1>Nothing here</h1>".to_string(), 404)))
    });

    app.after_request(|mut response| {
        response.set_header("x-powered-by", "flagon".to_string());
        Ok(response)
    });

    info!(routes = app.router().rules().len(), "Demo application ready");
    Ok(app)
}
