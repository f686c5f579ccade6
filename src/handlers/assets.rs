//! Static asset serving.
//!
//! Assets are addressed by bare filename inside the document root. Names
//! carrying a separator or a parent-directory token are rejected before any
//! filesystem access.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::ServerConfig;
use crate::http::response::Response;

/// Assets larger than this are treated as absent.
pub const MAX_ASSET_SIZE: u64 = 1024 * 1024;

pub const LOGIN_PAGE: &str = "login.html";
pub const FUNC_JS: &str = "func.js";

/// Shown for `GET /` when the login page asset is missing on disk.
pub const FALLBACK_LOGIN_PAGE: &str = "<!DOCTYPE html>\n\
<html><head>\
<title>Developing...</title>\
<meta charset=\"UTF-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
</head>\n\
<body>\n\
<h1>Device Login</h1>\n\
<form method='post' action='/login'>\n\
<p>Username: <input type='text' name='username' maxlength='31'></p>\n\
<p>Password: <input type='password' name='password' maxlength='63'></p>\n\
<p><input type='submit' value='Login'></p>\n\
</form>\n\
<p><strong>Note:</strong> login.html file not found. Using fallback.</p>\n\
</body></html>";

pub fn serve_login_page(config: &ServerConfig) -> Response {
    match load_asset(config, LOGIN_PAGE) {
        Ok(content) => Response::new(200, "text/html", content),
        Err(_) => Response::html(200, FALLBACK_LOGIN_PAGE),
    }
}

pub fn serve_func_js(config: &ServerConfig) -> Response {
    match load_asset(config, FUNC_JS) {
        Ok(content) => Response::new(200, "application/javascript", content),
        Err(_) => Response::error(404, "JavaScript file not found"),
    }
}

/// Loads one named asset from the docroot. The name check runs before any
/// path is even formed.
pub fn load_asset(config: &ServerConfig, name: &str) -> io::Result<Vec<u8>> {
    if !safe_asset_name(name) {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "unsafe asset name"));
    }

    let path = config.docroot.join(name);
    if config.no_symlinks && is_symlink(&path) {
        return Err(io::Error::new(io::ErrorKind::PermissionDenied, "symlinked asset"));
    }
    let meta = fs::metadata(&path)?;
    if !meta.is_file() || meta.len() == 0 || meta.len() > MAX_ASSET_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a servable file"));
    }
    fs::read(&path)
}

/// A servable name is a bare filename: no separators, no `..`.
fn safe_asset_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_docroot(dir: &Path) -> ServerConfig {
        ServerConfig { docroot: dir.to_path_buf(), ..ServerConfig::default() }
    }

    #[test]
    fn traversal_names_are_rejected_before_fs_access() {
        // Nonexistent docroot: a rejected name must not even get as far as
        // a filesystem probe that would report NotFound.
        let config = config_with_docroot(Path::new("/definitely/not/here"));
        for name in ["../secret", "a/b", "..", "x\\y", ""] {
            let err = load_asset(&config, name).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name}");
        }
    }

    #[test]
    fn loads_plain_file_from_docroot() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("func.js")).unwrap();
        f.write_all(b"function x() {}").unwrap();

        let config = config_with_docroot(dir.path());
        assert_eq!(load_asset(&config, "func.js").unwrap(), b"function x() {}");
    }

    #[test]
    fn missing_asset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_docroot(dir.path());
        assert!(load_asset(&config, "func.js").is_err());
    }

    #[test]
    fn oversize_asset_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![b'x'; (MAX_ASSET_SIZE + 1) as usize];
        std::fs::write(dir.path().join("big.html"), big).unwrap();

        let config = config_with_docroot(dir.path());
        assert!(load_asset(&config, "big.html").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_asset_is_refused_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.js"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.js"), dir.path().join("link.js"))
            .unwrap();

        let mut config = config_with_docroot(dir.path());
        config.no_symlinks = true;
        assert!(load_asset(&config, "link.js").is_err());
        assert!(load_asset(&config, "real.js").is_ok());

        config.no_symlinks = false;
        assert!(load_asset(&config, "link.js").is_ok());
    }

    #[test]
    fn fallback_page_is_served_when_login_page_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_docroot(dir.path());
        let resp = serve_login_page(&config);
        assert_eq!(resp.status, 200);
        assert!(String::from_utf8(resp.body).unwrap().contains("Device Login"));
    }
}
