//! In-process test client.
//!
//! Sends requests straight into [`App::handle`] without a socket and keeps
//! a cookie jar, so a session set by one call is sent back on the next.

use http::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::App;
use crate::dispatcher::DispatchError;
use crate::server::{Request, Response};

#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    cookies: BTreeMap<String, String>,
}

impl TestClient {
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            cookies: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    /// # Errors
    ///
    /// The pipeline terminated abnormally.
    pub fn get(&mut self, target: &str) -> Result<Response, DispatchError> {
        self.open(Request::get(target))
    }

    /// POST a form-encoded body.
    ///
    /// # Errors
    ///
    /// The pipeline terminated abnormally.
    pub fn post(&mut self, target: &str, form: &[(&str, &str)]) -> Result<Response, DispatchError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        self.open(
            Request::new(Method::POST, target)
                .with_header("content-type", "application/x-www-form-urlencoded")
                .with_body(body),
        )
    }

    /// Send `request` with the jar's cookies and record any it sets.
    ///
    /// # Errors
    ///
    /// The pipeline terminated abnormally.
    pub fn open(&mut self, mut request: Request) -> Result<Response, DispatchError> {
        for (name, value) in &self.cookies {
            if request.cookie(name).is_none() {
                request = request.with_cookie(name, value);
            }
        }
        let response = self.app.handle(request)?;
        self.store_cookies(&response);
        Ok(response)
    }

    fn store_cookies(&mut self, response: &Response) {
        for header in response.header_all("set-cookie") {
            let mut attrs = header.split(';').map(str::trim);
            let Some((name, value)) = attrs.next().and_then(|pair| pair.split_once('=')) else {
                continue;
            };
            let expired = attrs.any(|a| a.eq_ignore_ascii_case("max-age=0"));
            if expired {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }
}
