//! Cookie-backed sessions.
//!
//! Session data is a JSON object serialized into a single signed cookie.
//! Without a secret key there is no session at all. A cookie that is
//! missing, malformed or fails verification yields an empty session rather
//! than an error.

mod codec;
mod core;

pub use codec::{sign, unsign, CodecError};
pub use core::{Session, FLASHES_KEY};

use tracing::{debug, warn};

use crate::server::{CookieOptions, Request, Response};

/// Load the session for `request`.
///
/// Returns `None` when no secret key is configured.
#[must_use]
pub fn open_session(request: &Request, cookie_name: &str, secret_key: Option<&str>) -> Option<Session> {
    let key = secret_key?;
    let Some(value) = request.cookie(cookie_name) else {
        return Some(Session::new());
    };
    match unsign(value, key) {
        Ok(data) => Some(Session::from_data(data)),
        Err(e) => {
            debug!(request_id = %request.request_id, reason = %e, "Session cookie rejected; starting empty session");
            Some(Session::new())
        }
    }
}

/// Write `session` back as a cookie on `response`.
///
/// No-op when there is no session, no key, or nothing changed. Returns
/// whether a cookie was written.
pub fn save_session(
    session: Option<&Session>,
    response: &mut Response,
    cookie_name: &str,
    secret_key: Option<&str>,
    options: &CookieOptions,
) -> bool {
    let (Some(session), Some(key)) = (session, secret_key) else {
        return false;
    };
    if !session.should_save() {
        return false;
    }
    match sign(session.data(), key) {
        Ok(value) => {
            response.set_cookie(cookie_name, &value, options);
            true
        }
        Err(e) => {
            warn!(error = %e, "Session could not be signed; cookie not written");
            false
        }
    }
}
