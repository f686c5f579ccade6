//! Response composer.
//!
//! Every reply carries the same hardening header set, an exact
//! Content-Length, and `Connection: close`; the server never keeps a
//! connection alive past one cycle.

/// Reason phrase for the small fixed set of codes this server emits.
pub fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self { status, content_type, body }
    }

    /// 200 application/json.
    pub fn json(body: String) -> Self {
        Self::json_with_status(200, body)
    }

    pub fn json_with_status(status: u16, body: String) -> Self {
        Self::new(status, "application/json", body.into_bytes())
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self::new(status, "text/html", body.as_bytes().to_vec())
    }

    /// HTML error page. The message is sanitized before being embedded so a
    /// reply can never inject markup into the rendered page.
    pub fn error(status: u16, message: &str) -> Self {
        let safe = sanitize_message(message);
        let body = format!(
            "<html><head><title>Error {status}</title></head>\
             <body><h1>Error {status}</h1><p>{safe}</p></body></html>"
        );
        Self::html(status, &body)
    }

    /// Serializes status line, headers, blank line and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             X-Content-Type-Options: nosniff\r\n\
             X-Frame-Options: DENY\r\n\
             X-XSS-Protection: 1; mode=block\r\n\
             Cache-Control: no-cache, no-store, must-revalidate\r\n\
             \r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len(),
        );
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

/// Drops `<`, `>`, `"` and `&` so the message cannot carry markup.
fn sanitize_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '&'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_block(bytes: &[u8]) -> String {
        let pos = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        String::from_utf8(bytes[..pos].to_vec()).unwrap()
    }

    #[test]
    fn content_length_is_exact_and_blank_line_precedes_body() {
        let resp = Response::json(String::from("{\"error_code\":0}"));
        let bytes = resp.to_bytes();
        let head = header_block(&bytes);
        assert!(head.contains("Content-Length: 16"));
        let body_start = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        assert_eq!(&bytes[body_start..], b"{\"error_code\":0}");
    }

    #[test]
    fn hardening_headers_are_always_present() {
        for resp in [Response::json(String::new()), Response::error(404, "Not Found")] {
            let head = header_block(&resp.to_bytes());
            assert!(head.contains("X-Content-Type-Options: nosniff"));
            assert!(head.contains("X-Frame-Options: DENY"));
            assert!(head.contains("X-XSS-Protection: 1; mode=block"));
            assert!(head.contains("Cache-Control: no-cache, no-store, must-revalidate"));
            assert!(head.contains("Connection: close"));
        }
    }

    #[test]
    fn reason_table_covers_emitted_codes() {
        assert_eq!(reason(200), "OK");
        assert_eq!(reason(405), "Method Not Allowed");
        assert_eq!(reason(414), "URI Too Long");
        assert_eq!(reason(418), "Unknown");
    }

    #[test]
    fn error_page_drops_markup_characters() {
        let resp = Response::error(400, "bad <script>\"x\"&</script>");
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("bad scriptx/script"));
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn empty_body_still_has_zero_content_length() {
        let head = header_block(&Response::json(String::new()).to_bytes());
        assert!(head.contains("Content-Length: 0"));
    }
}
