use crate::error::RequestError;

/// Anything shorter than this cannot carry a method, path and version.
pub const MIN_REQUEST_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request, borrowed from the slot buffer for the duration of a cycle.
#[derive(Debug)]
pub struct ParsedRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub version: &'a str,
    head: &'a str,
    body: Option<&'a [u8]>,
}

impl<'a> ParsedRequest<'a> {
    /// Splits one raw buffer into request line, head and body.
    ///
    /// Rejection order follows the wire checks: minimum size, line shape,
    /// method, path bound. The body is everything after the first blank
    /// line; `None` when the buffer has no blank line at all.
    pub fn parse(raw: &'a [u8], max_path_len: usize) -> Result<Self, RequestError> {
        if raw.len() < MIN_REQUEST_LEN {
            return Err(RequestError::TooShort);
        }

        let (head_bytes, body) = match find_blank_line(raw) {
            Some(pos) => (&raw[..pos], Some(&raw[pos + 4..])),
            None => (raw, None),
        };
        let head = std::str::from_utf8(head_bytes).map_err(|_| RequestError::Malformed)?;

        let line = head.lines().next().ok_or(RequestError::Malformed)?;
        let mut parts = line.split_whitespace();
        let method_token = parts.next().ok_or(RequestError::Malformed)?;
        let path = parts.next().ok_or(RequestError::Malformed)?;
        let version = parts.next().ok_or(RequestError::Malformed)?;

        let method = match method_token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => return Err(RequestError::MethodNotAllowed),
        };

        if path.len() > max_path_len {
            return Err(RequestError::UriTooLong);
        }

        Ok(Self { method, path, version, head, body })
    }

    /// Body slice, if the head/body boundary was present.
    pub fn body(&self) -> Option<&'a [u8]> {
        self.body
    }

    /// Substring probe over the raw head. Header values beyond the request
    /// line are located this way rather than through a header map.
    pub fn head_contains(&self, needle: &str) -> bool {
        self.head.contains(needle)
    }
}

/// Byte offset of the first CRLF CRLF, if any.
pub fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Whether `buf` holds a complete request: the blank-line boundary is
/// present and, when a Content-Length header was sent, that many body bytes
/// have arrived.
pub fn is_complete(buf: &[u8]) -> bool {
    match find_blank_line(buf) {
        Some(pos) => {
            let header_end = pos + 4;
            let content_length = content_length(&buf[..header_end]).unwrap_or(0);
            buf.len() - header_end >= content_length
        }
        None => false,
    }
}

fn content_length(head: &[u8]) -> Option<usize> {
    let head = std::str::from_utf8(head).ok()?;
    for line in head.lines() {
        let lower = line.to_lowercase();
        if let Some(rest) = lower.strip_prefix("content-length:") {
            return rest.trim().parse().ok();
        }
    }
    None
}
