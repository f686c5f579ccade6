//! Error types for camhttpd.
//!
//! Every error in this module is local to one request/response cycle and is
//! answered with an HTTP reply; only [`FatalError`] terminates the process.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Structural problems with the request line, detected before routing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request below minimum viable size")]
    TooShort,

    #[error("method, path and version could not be extracted")]
    Malformed,

    #[error("method is not GET or POST")]
    MethodNotAllowed,

    #[error("request path exceeds the configured bound")]
    UriTooLong,
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::TooShort | RequestError::Malformed => 400,
            RequestError::MethodNotAllowed => 405,
            RequestError::UriTooLong => 414,
        }
    }

    /// Human-readable text embedded in the error page.
    pub fn message(&self) -> &'static str {
        match self {
            RequestError::TooShort => "Request too short",
            RequestError::Malformed => "Invalid request",
            RequestError::MethodNotAllowed => "Method not allowed",
            RequestError::UriTooLong => "URI too long",
        }
    }
}

/// Problems with the request body as a whole.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("request has no body")]
    Missing,

    #[error("request body is empty")]
    Empty,

    #[error("request body exceeds the configured ceiling")]
    TooLarge,
}

impl BodyError {
    pub fn status(&self) -> u16 {
        match self {
            BodyError::Missing | BodyError::Empty => 400,
            BodyError::TooLarge => 413,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            BodyError::Missing => "No request body",
            BodyError::Empty => "Empty request body",
            BodyError::TooLarge => "Request entity too large",
        }
    }
}

/// A decoder could not produce the requested fields. Field names are never
/// echoed back to the peer; handlers reply with a generic message instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input exceeds the decoder size bound")]
    Oversize,

    #[error("input is not a well-formed flat object")]
    Malformed,

    #[error("a required field was not found")]
    FieldNotFound,
}

/// Failures of the external language-setting script. All variants surface as
/// the same operation-failed reply; none of them are retried or propagated.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to spawn script: {0}")]
    Spawn(#[from] io::Error),

    #[error("script output was not a JSON object with an integer err_code")]
    Output,

    #[error("script reported err_code {0}")]
    BadStatus(i64),
}

/// Startup failures. Nothing past a successful bind produces one of these.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("poll error: {0}")]
    Poll(io::Error),
}
