//! Request routing.
//!
//! Exact (method, path) dispatch over the fixed endpoint set. Handlers are
//! pure with respect to the connection: they take the parsed request and
//! produce a [`Response`]; all socket work stays in the server loop.

pub mod assets;
pub mod auth;
pub mod language;

pub use auth::{Credentials, StaticCredentials};

use crate::config::ServerConfig;
use crate::error::BodyError;
use crate::http::request::{Method, ParsedRequest};
use crate::http::response::Response;

/// Turns one raw request buffer into a response. Never panics on untrusted
/// input; every failure maps to a reply.
pub fn handle(config: &ServerConfig, creds: &dyn Credentials, raw: &[u8]) -> Response {
    let req = match ParsedRequest::parse(raw, config.max_path_len) {
        Ok(req) => req,
        Err(e) => return Response::error(e.status(), e.message()),
    };

    // The body ceiling holds for every route, whatever the content type.
    if let Some(body) = req.body() {
        if body.len() > config.max_body_size {
            let e = BodyError::TooLarge;
            return Response::error(e.status(), e.message());
        }
    }

    match (req.method, req.path) {
        (Method::Post, "/login") => auth::login(config, creds, &req),
        (Method::Post, "/") => language::set_language(config, &req),
        (Method::Get, "/func.js") => assets::serve_func_js(config),
        (Method::Get, "/") | (Method::Get, "/index.html") => assets::serve_login_page(config),
        _ => Response::error(404, "Not Found"),
    }
}
