//! Minimal JSON subset used on both sides of the wire.
//!
//! The parsed form is a flat object whose values are plain strings or bare
//! integers; nesting, arrays, escapes, floats and booleans are unsupported.
//! An unsupported value is consumed and discarded, so the key's lookup fails
//! while the document as a whole still parses. Total input and every field
//! are bounded, so attacker-controlled bodies can never allocate past a
//! fixed ceiling.

use crate::error::DecodeError;

/// Largest document the tokenizer will look at.
pub const MAX_DOCUMENT: usize = 4096;
/// Largest accepted string value.
pub const MAX_FIELD: usize = 256;
/// Largest accepted key.
pub const MAX_KEY: usize = 64;

#[derive(Debug, PartialEq)]
enum Scalar {
    Str(String),
    Int(i64),
}

/// A parsed flat object.
#[derive(Debug, Default)]
pub struct JsonObject {
    fields: Vec<(String, Scalar)>,
}

impl JsonObject {
    /// Tokenizes `input` as a flat object. Succeeding here only asserts that
    /// the input is an object; individual lookups can still fail.
    pub fn parse(input: &[u8]) -> Result<Self, DecodeError> {
        if input.len() > MAX_DOCUMENT {
            return Err(DecodeError::Oversize);
        }
        let text = std::str::from_utf8(input).map_err(|_| DecodeError::Malformed)?;
        let mut lex = Lexer::new(text);

        lex.skip_ws();
        lex.expect('{')?;
        lex.skip_ws();

        let mut fields = Vec::new();
        if lex.eat('}') {
            return Ok(Self { fields });
        }
        loop {
            lex.skip_ws();
            let key = lex.string(MAX_KEY)?;
            lex.skip_ws();
            lex.expect(':')?;
            lex.skip_ws();
            let value = lex.scalar()?;
            if let (Some(key), Some(value)) = (key, value) {
                fields.push((key, value));
            }
            lex.skip_ws();
            if lex.eat(',') {
                continue;
            }
            lex.expect('}')?;
            // Trailing bytes after the closing brace are ignored.
            return Ok(Self { fields });
        }
    }

    /// Keys captured from the document, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// String value for `key`, if the key was present with a clean string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find_map(|(k, v)| match v {
            Scalar::Str(s) if k == key => Some(s.as_str()),
            _ => None,
        })
    }

    /// Integer value for `key`. Only bare integer literals qualify.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.fields.iter().find_map(|(k, v)| match v {
            Scalar::Int(n) if k == key => Some(*n),
            _ => None,
        })
    }
}

struct Lexer<'a> {
    rest: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start_matches([' ', '\t', '\r', '\n']);
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if let Some(stripped) = self.rest.strip_prefix(c) {
            self.rest = stripped;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), DecodeError> {
        if self.eat(c) { Ok(()) } else { Err(DecodeError::Malformed) }
    }

    /// Consumes a quoted string. `Ok(None)` means the string was consumed but
    /// is unsupported (escape sequence or over `max` bytes long). Backslashes
    /// are honored while scanning so an escaped quote cannot desynchronize
    /// the tokenizer.
    fn string(&mut self, max: usize) -> Result<Option<String>, DecodeError> {
        self.expect('"')?;
        let bytes = self.rest.as_bytes();
        let mut i = 0;
        let mut escaped = false;
        let mut has_escape = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if !escaped => {
                    escaped = true;
                    has_escape = true;
                }
                b'"' if !escaped => break,
                _ => escaped = false,
            }
            i += 1;
        }
        if i >= bytes.len() {
            return Err(DecodeError::Malformed);
        }
        let raw = &self.rest[..i];
        self.rest = &self.rest[i + 1..];
        if has_escape || raw.len() > max {
            return Ok(None);
        }
        Ok(Some(raw.to_string()))
    }

    /// Consumes one value. Strings and bare integers are captured; any other
    /// shape is skipped and reported as `Ok(None)`.
    fn scalar(&mut self) -> Result<Option<Scalar>, DecodeError> {
        match self.peek() {
            Some('"') => Ok(self.string(MAX_FIELD)?.map(Scalar::Str)),
            Some('{') | Some('[') => {
                self.skip_nested()?;
                Ok(None)
            }
            Some(_) => {
                let end = self
                    .rest
                    .find([',', '}', ']', ' ', '\t', '\r', '\n'])
                    .unwrap_or(self.rest.len());
                let token = &self.rest[..end];
                if token.is_empty() {
                    return Err(DecodeError::Malformed);
                }
                self.rest = &self.rest[end..];
                Ok(token.parse::<i64>().ok().map(Scalar::Int))
            }
            None => Err(DecodeError::Malformed),
        }
    }

    /// Skips one balanced `{...}` or `[...]` without interpreting it. Quoted
    /// sections are honored so braces inside strings do not count.
    fn skip_nested(&mut self) -> Result<(), DecodeError> {
        let mut depth = 0usize;
        let mut in_string = false;
        for (i, c) in self.rest.char_indices() {
            if in_string {
                if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.rest = &self.rest[i + c.len_utf8()..];
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(DecodeError::Malformed)
    }
}

/// Serializer for the canonical reply payloads. Fields render in insertion
/// order; string values get minimal quote/backslash escaping so the output
/// stays a valid object whatever the username was.
pub struct JsonPayload {
    buf: String,
}

impl JsonPayload {
    pub fn new() -> Self {
        Self { buf: String::from("{") }
    }

    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.sep();
        self.buf.push('"');
        self.buf.push_str(key);
        self.buf.push_str("\":");
        self.buf.push_str(&value.to_string());
        self
    }

    pub fn string(mut self, key: &str, value: &str) -> Self {
        self.sep();
        self.buf.push('"');
        self.buf.push_str(key);
        self.buf.push_str("\":\"");
        for c in value.chars() {
            match c {
                '"' => self.buf.push_str("\\\""),
                '\\' => self.buf.push_str("\\\\"),
                _ => self.buf.push(c),
            }
        }
        self.buf.push('"');
        self
    }

    pub fn finish(mut self) -> String {
        self.buf.push('}');
        self.buf
    }

    fn sep(&mut self) {
        if self.buf.len() > 1 {
            self.buf.push(',');
        }
    }
}

impl Default for JsonPayload {
    fn default() -> Self {
        Self::new()
    }
}
