use http::Method;
use may_minihttp::{HttpService, Request as RawRequest, Response as RawResponse};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::request::parse_request;
use super::response::{write_internal_error, write_response, HeaderLines};
use crate::app::App;

/// `may_minihttp` service that feeds every request through [`App::handle`].
///
/// One clone serves each connection and owns that connection's header
/// lines. A request that terminates abnormally is logged and answered with
/// a plain 500; the connection and every other request are unaffected.
pub struct AppService {
    pub app: Arc<App>,
    lines: HeaderLines,
}

impl AppService {
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            lines: HeaderLines::new(),
        }
    }
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.app))
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: RawRequest, res: &mut RawResponse) -> io::Result<()> {
        let start = Instant::now();
        let request = parse_request(req);
        let request_id = request.request_id;
        let is_head = request.method == Method::HEAD;

        match self.app.handle(request) {
            Ok(mut response) => {
                if is_head {
                    response.body.clear();
                }
                info!(
                    request_id = %request_id,
                    status = response.status,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "HTTP response sent"
                );
                write_response(res, response, &mut self.lines);
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Request terminated abnormally"
                );
                write_internal_error(res);
            }
        }
        Ok(())
    }
}
