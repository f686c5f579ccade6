//! Body decoders.
//!
//! Each decoder turns one raw body into a flat map of named string fields.
//! The router picks a decoder by sensing the content shape; handlers only
//! ever see the [`FieldMap`], so alternate body formats plug in behind
//! [`BodyDecoder`] without touching routing.

use crate::error::DecodeError;
use crate::http::json::{self, JsonObject};

/// Largest value any decoder will capture for a single field.
pub const MAX_VALUE_LEN: usize = json::MAX_FIELD;

/// Named string fields extracted from one body.
#[derive(Debug, Default)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    fn insert(&mut self, key: &str, value: String) {
        self.entries.push((key.to_string(), value));
    }
}

/// One body format. `decode` must reject malformed or incomplete input
/// without writing anything past the decoder's value bound.
pub trait BodyDecoder {
    fn decode(&self, body: &[u8]) -> Result<FieldMap, DecodeError>;
}

/// Minimal-JSON bodies. Captures every clean string field; presence of the
/// fields a handler needs is the handler's concern.
pub struct JsonDecoder;

impl BodyDecoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<FieldMap, DecodeError> {
        let obj = JsonObject::parse(body)?;
        let mut map = FieldMap::default();
        for key in obj.keys() {
            if let Some(value) = obj.get(key) {
                map.insert(key, value.to_string());
            }
        }
        Ok(map)
    }
}

/// multipart/form-data bodies. Built with the field names the caller needs;
/// every one of them must be present or the whole decode fails.
pub struct MultipartDecoder<'a> {
    field_names: &'a [&'a str],
}

impl<'a> MultipartDecoder<'a> {
    pub fn new(field_names: &'a [&'a str]) -> Self {
        Self { field_names }
    }

    fn extract(body: &[u8], name: &str) -> Result<String, DecodeError> {
        let marker = format!("name=\"{name}\"");
        let at = find_bytes(body, marker.as_bytes(), 0).ok_or(DecodeError::FieldNotFound)?;

        // Value starts on the line after the part headers.
        let line_end =
            find_bytes(body, b"\n", at + marker.len()).ok_or(DecodeError::Malformed)?;
        let value_start = line_end + 1;

        let value_end = find_bytes(body, b"\n------", value_start)
            .or_else(|| find_bytes(body, b"\r\n------", value_start))
            .ok_or(DecodeError::Malformed)?;
        if value_end <= value_start {
            return Err(DecodeError::Malformed);
        }

        let mut raw = &body[value_start..value_end];
        if raw.len() > MAX_VALUE_LEN {
            raw = &raw[..MAX_VALUE_LEN];
        }
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::Malformed)?;
        Ok(trim_field(text).to_string())
    }
}

impl BodyDecoder for MultipartDecoder<'_> {
    fn decode(&self, body: &[u8]) -> Result<FieldMap, DecodeError> {
        let mut map = FieldMap::default();
        for name in self.field_names {
            map.insert(name, Self::extract(body, name)?);
        }
        Ok(map)
    }
}

/// application/x-www-form-urlencoded bodies. Captured values stay
/// percent-encoded; no decoding pass is performed.
pub struct UrlEncodedDecoder<'a> {
    field_names: &'a [&'a str],
}

impl<'a> UrlEncodedDecoder<'a> {
    pub fn new(field_names: &'a [&'a str]) -> Self {
        Self { field_names }
    }
}

impl BodyDecoder for UrlEncodedDecoder<'_> {
    fn decode(&self, body: &[u8]) -> Result<FieldMap, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|_| DecodeError::Malformed)?;
        let mut map = FieldMap::default();
        for name in self.field_names {
            let mut value = text
                .split('&')
                .find_map(|pair| pair.strip_prefix(name).and_then(|v| v.strip_prefix('=')))
                .ok_or(DecodeError::FieldNotFound)?;
            if value.is_empty() {
                return Err(DecodeError::FieldNotFound);
            }
            if value.len() > MAX_VALUE_LEN {
                value = truncate_str(value, MAX_VALUE_LEN);
            }
            map.insert(name, value.to_string());
        }
        Ok(map)
    }
}

fn trim_field(s: &str) -> &str {
    s.trim_matches([' ', '\t', '\r', '\n'])
}

/// Byte-bounded truncation that backs off to the nearest char boundary.
fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    haystack
        .get(start..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}
