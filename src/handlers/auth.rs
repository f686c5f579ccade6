//! Login flow.
//!
//! The credential decision itself sits behind [`Credentials`] so deployments
//! can plug in a real store; the bundled [`StaticCredentials`] is a stand-in
//! equality check against a pair injected at startup.

use log::debug;

use crate::config::ServerConfig;
use crate::error::BodyError;
use crate::http::form::{
    find_bytes, BodyDecoder, JsonDecoder, MultipartDecoder, UrlEncodedDecoder,
};
use crate::http::json::JsonPayload;
use crate::http::request::ParsedRequest;
use crate::http::response::Response;

pub const ERR_INVALID_FORMAT: i64 = -40209;
pub const ERR_INVALID_CREDENTIALS: i64 = -40401;
pub const ERR_DEVICE_LOCKED: i64 = -40404;
pub const ERR_INVALID_NONCE: i64 = -40410;
pub const ERR_USER_NOT_FOUND: i64 = -60502;
pub const ERR_BIND_FAILED: i64 = -90000;

/// Credential verification capability. Returns the role for a valid pair.
pub trait Credentials {
    fn verify(&self, username: &str, password: &str) -> Option<&str>;
}

/// Single fixed username/password pair, compared for equality. The pair
/// comes from the environment at startup; an empty pair matches nothing,
/// so an unconfigured server fails every login closed.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub const USER_VAR: &'static str = "CAMHTTPD_ADMIN_USER";
    pub const PASS_VAR: &'static str = "CAMHTTPD_ADMIN_PASS";

    pub fn new(username: &str, password: &str) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }

    pub fn from_env() -> Option<Self> {
        let username = std::env::var(Self::USER_VAR).ok()?;
        let password = std::env::var(Self::PASS_VAR).ok()?;
        Some(Self::new(&username, &password))
    }

    pub fn disabled() -> Self {
        Self::new("", "")
    }
}

impl Credentials for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> Option<&str> {
        if !self.username.is_empty() && username == self.username && password == self.password {
            Some("admin")
        } else {
            None
        }
    }
}

/// `POST /login`. The decoder is picked by sensing the content shape: JSON
/// first, multipart next, url-encoded as the fallback.
pub fn login(config: &ServerConfig, creds: &dyn Credentials, req: &ParsedRequest) -> Response {
    let body = match req.body() {
        None => return body_error(BodyError::Missing),
        Some(b) if b.is_empty() => return body_error(BodyError::Empty),
        Some(b) => b,
    };

    // Multipart is sensed over head and body alike: browsers put the
    // Content-Disposition marker inside the part headers, not the request
    // head.
    let multipart = req.head_contains("Content-Disposition: form-data")
        || find_bytes(body, b"Content-Disposition: form-data", 0).is_some();

    let fields = if body.starts_with(b"{") {
        match JsonDecoder.decode(body) {
            Ok(f) => f,
            Err(_) => return Response::error(400, "Invalid JSON"),
        }
    } else if multipart {
        match MultipartDecoder::new(&["username", "password"]).decode(body) {
            Ok(f) => f,
            Err(_) => return Response::error(400, "Failed to parse form data"),
        }
    } else {
        match UrlEncodedDecoder::new(&["username", "password"]).decode(body) {
            Ok(f) => f,
            Err(_) => return Response::error(400, "Failed to parse form data"),
        }
    };

    let username = fields.get("username").unwrap_or("");
    if !user_exists(username, config.max_username_len) {
        return unauthorized(ERR_USER_NOT_FOUND);
    }

    let password = fields.get("password").unwrap_or("");
    match creds.verify(username, password) {
        Some(role) => {
            debug!("login accepted for {username}");
            success(username, role)
        }
        None => unauthorized(ERR_INVALID_CREDENTIALS),
    }
}

/// A username names a known user only when non-empty and under the bound.
fn user_exists(username: &str, bound: usize) -> bool {
    !username.is_empty() && username.len() < bound
}

fn success(username: &str, role: &str) -> Response {
    let body = JsonPayload::new()
        .int("error_code", 0)
        .string("message", "Login successful")
        .string("user", clip(username, 32))
        .string("role", clip(role, 32))
        .finish();
    Response::json(body)
}

pub fn unauthorized(error_code: i64) -> Response {
    let body = JsonPayload::new()
        .int("error_code", error_code)
        .string("message", auth_message(error_code))
        .finish();
    Response::json_with_status(401, body)
}

fn auth_message(error_code: i64) -> &'static str {
    match error_code {
        ERR_INVALID_FORMAT => "Invalid request format",
        ERR_USER_NOT_FOUND => "User does not exist",
        ERR_DEVICE_LOCKED => "Device is locked",
        ERR_INVALID_NONCE => "Invalid nonce",
        ERR_INVALID_CREDENTIALS => "Invalid credentials",
        ERR_BIND_FAILED => "FFS bind error",
        _ => "Authentication failed",
    }
}

fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn body_error(e: BodyError) -> Response {
    Response::error(e.status(), e.message())
}
