//! Language-setting proxy.
//!
//! `POST /` hands the raw JSON body to an external script and relays its
//! verdict. The script is a black box: it receives the body as one argument,
//! prints a JSON object with an integer `err_code` to stdout, and anything
//! else it does is its own business. Its output is untrusted and is
//! structurally validated before use.

use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::config::ServerConfig;
use crate::error::ScriptError;
use crate::handlers::auth::ERR_INVALID_FORMAT;
use crate::http::json::{JsonObject, JsonPayload};
use crate::http::request::ParsedRequest;
use crate::http::response::Response;

pub const ERR_OPERATION_FAILED: i64 = -40101;

/// Script invoked for every settings request, resolved inside the docroot.
pub const SETLANG_SCRIPT: &str = "setlang.sh";

pub fn set_language(config: &ServerConfig, req: &ParsedRequest) -> Response {
    let body = match req.body() {
        Some(b) if !b.is_empty() => b,
        _ => return err_code_reply(ERR_INVALID_FORMAT),
    };

    // A parseable flat object is all the validation the request gets; the
    // script sees the body verbatim.
    if JsonObject::parse(body).is_err() {
        return err_code_reply(ERR_INVALID_FORMAT);
    }
    let Ok(raw) = std::str::from_utf8(body) else {
        return err_code_reply(ERR_INVALID_FORMAT);
    };

    match run_script(config, raw) {
        Ok(()) => Response::json(JsonPayload::new().int("error_code", 0).finish()),
        Err(e) => {
            warn!("language script failed: {e}");
            err_code_reply(ERR_OPERATION_FAILED)
        }
    }
}

/// Spawns the script with the body as a single argument (never through a
/// shell) and validates its stdout.
fn run_script(config: &ServerConfig, raw_body: &str) -> Result<(), ScriptError> {
    let script = config.docroot.join(SETLANG_SCRIPT);
    debug!("running {} {raw_body}", script.display());
    let output = Command::new(&script)
        .arg(raw_body)
        .current_dir(&config.docroot)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;

    let result = JsonObject::parse(&output.stdout).map_err(|_| ScriptError::Output)?;
    match result.get_int("err_code") {
        Some(0) => Ok(()),
        Some(code) => Err(ScriptError::BadStatus(code)),
        None => Err(ScriptError::Output),
    }
}

pub fn err_code_reply(error_code: i64) -> Response {
    let body = JsonPayload::new()
        .int("error_code", error_code)
        .string("message", settings_message(error_code))
        .finish();
    Response::json(body)
}

fn settings_message(error_code: i64) -> &'static str {
    match error_code {
        ERR_INVALID_FORMAT => "Invalid request format",
        ERR_OPERATION_FAILED => "Operation failed",
        _ => "Unknown error",
    }
}
