//! # Incremental Object Decoding
//!
//! The model streams its JSON object as text deltas. [`PartialObjectDecoder`]
//! accumulates them and, after each delta, re-scans the whole buffer with a
//! truncation-tolerant scanner, merging whatever fields are readable into its
//! record.
//!
//! ## Field rules
//!
//! - `verdict` and `rating` are enum-typed: they appear only once their token is
//!   closed and valid, so a half-received `"sma` never shows up.
//! - `explanation` appears as soon as it has text and grows with each delta.
//! - Unknown keys and nested values are skipped.
//!
//! Re-scanning the full buffer keeps the scanner stateless; buffers are a few
//! hundred bytes, so the quadratic cost is irrelevant.

use tracing::trace;

use super::types::{PartialVerdict, Rating, Verdict, VerdictKind};
use crate::error::{VerdictError, VerdictResult};

/// Accumulates text deltas into a [`PartialVerdict`].
#[derive(Debug, Default, Clone)]
pub struct PartialObjectDecoder {
    buffer: String,
    record: PartialVerdict,
}

impl PartialObjectDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta. Returns a snapshot only when the record changed.
    pub fn push(&mut self, delta: &str) -> Option<PartialVerdict> {
        if delta.is_empty() {
            return None;
        }
        self.buffer.push_str(delta);
        let outcome = scan(&self.buffer);
        if self.record.merge(&outcome.fields) {
            trace!(fields = self.record.field_count(), "partial object advanced");
            Some(self.record.clone())
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> &PartialVerdict {
        &self.record
    }

    /// Raw text received so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// The complete verdict, or a malformed-response error if the text never
    /// formed one.
    pub fn finish(&self) -> VerdictResult<Verdict> {
        if self.buffer.trim().is_empty() {
            return Err(VerdictError::malformed("empty response"));
        }
        let outcome = scan(&self.buffer);
        if self.record.explanation.is_some() && !outcome.explanation_closed {
            return Err(VerdictError::malformed("response ended inside the explanation"));
        }
        self.record.clone().into_complete()
    }
}

/// What one pass over the buffer could read.
#[derive(Debug, Default)]
pub(crate) struct ScanOutcome {
    pub fields: PartialVerdict,
    pub explanation_closed: bool,
    pub object_closed: bool,
}

/// Scan the first top-level object in `input`, tolerating truncation anywhere.
pub(crate) fn scan(input: &str) -> ScanOutcome {
    let mut out = ScanOutcome::default();
    let bytes = input.as_bytes();
    // Anything before the object (a code fence, stray prose) is ignored.
    let Some(start) = bytes.iter().position(|&b| b == b'{') else {
        return out;
    };
    let mut cur = Cursor {
        bytes,
        pos: start + 1,
    };

    loop {
        cur.skip_ws();
        match cur.peek() {
            None => return out,
            Some(b'}') => {
                out.object_closed = true;
                return out;
            }
            Some(b',') => {
                cur.pos += 1;
                continue;
            }
            Some(b'"') => {}
            Some(_) => return out,
        }

        let key = cur.string();
        if !key.closed {
            return out;
        }
        cur.skip_ws();
        if cur.peek() != Some(b':') {
            return out;
        }
        cur.pos += 1;
        cur.skip_ws();

        let Some(value) = cur.value() else {
            return out;
        };
        apply(&mut out, &key.text, &value);
        if !value.is_complete() {
            return out;
        }
    }
}

fn apply(out: &mut ScanOutcome, key: &str, value: &Scalar) {
    match (key, value) {
        ("verdict", Scalar::Str(s)) if s.closed => {
            if let Some(v) = VerdictKind::parse(&s.text) {
                out.fields.verdict = Some(v);
            }
        }
        ("rating", Scalar::Str(s)) if s.closed => {
            if let Some(r) = Rating::parse_token(s.text.trim()) {
                out.fields.rating = Some(r);
            }
        }
        ("rating", Scalar::Raw { text, complete: true }) => {
            if let Some(r) = text.parse::<u8>().ok().and_then(Rating::new) {
                out.fields.rating = Some(r);
            }
        }
        ("explanation", Scalar::Str(s)) => {
            if s.closed || !s.text.is_empty() {
                out.fields.explanation = Some(s.text.clone());
                out.explanation_closed = s.closed;
            }
        }
        _ => {}
    }
}

struct StrToken {
    text: String,
    closed: bool,
}

enum Scalar {
    Str(StrToken),
    /// Number, literal, or a skipped object/array
    Raw { text: String, complete: bool },
}

impl Scalar {
    fn is_complete(&self) -> bool {
        match self {
            Scalar::Str(s) => s.closed,
            Scalar::Raw { complete, .. } => *complete,
        }
    }
}

enum Escape {
    Char(char),
    Incomplete,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Option<Scalar> {
        match self.peek()? {
            b'"' => Some(Scalar::Str(self.string())),
            b'{' | b'[' => {
                let complete = self.skip_nested();
                Some(Scalar::Raw {
                    text: String::new(),
                    complete,
                })
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace() {
                        break;
                    }
                    self.pos += 1;
                }
                // A token running into the end of the buffer may still grow ("1" -> "10").
                let complete = self.pos < self.bytes.len();
                Some(Scalar::Raw {
                    text: String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned(),
                    complete,
                })
            }
        }
    }

    /// Read a string starting at the opening quote.
    fn string(&mut self) -> StrToken {
        self.pos += 1;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return StrToken {
                    text: into_text(buf),
                    closed: false,
                };
            };
            match b {
                b'"' => {
                    self.pos += 1;
                    return StrToken {
                        text: into_text(buf),
                        closed: true,
                    };
                }
                b'\\' => match self.escape() {
                    Escape::Char(c) => {
                        let mut tmp = [0u8; 4];
                        buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                    }
                    Escape::Incomplete => {
                        self.pos = self.bytes.len();
                        return StrToken {
                            text: into_text(buf),
                            closed: false,
                        };
                    }
                },
                _ => {
                    buf.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    /// Decode the escape at `pos` (which is a backslash) and advance past it.
    fn escape(&mut self) -> Escape {
        let rest = &self.bytes[self.pos..];
        let Some(&kind) = rest.get(1) else {
            return Escape::Incomplete;
        };
        let simple = match kind {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => return self.unicode_escape(),
            _ => char::REPLACEMENT_CHARACTER,
        };
        self.pos += 2;
        Escape::Char(simple)
    }

    fn unicode_escape(&mut self) -> Escape {
        let rest = &self.bytes[self.pos..];
        if rest.len() < 6 {
            return Escape::Incomplete;
        }
        let Some(hi) = hex4(&rest[2..6]) else {
            self.pos += 6;
            return Escape::Char(char::REPLACEMENT_CHARACTER);
        };
        if !(0xD800..0xDC00).contains(&hi) {
            self.pos += 6;
            return Escape::Char(char::from_u32(hi).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        // High surrogate: the low half must follow as another \uXXXX.
        let tail = &rest[6..];
        match tail {
            [] | [b'\\'] => return Escape::Incomplete,
            [b'\\', b'u', ..] if tail.len() < 6 => return Escape::Incomplete,
            [b'\\', b'u', ..] => {
                if let Some(lo) = hex4(&tail[2..6]).filter(|lo| (0xDC00..0xE000).contains(lo)) {
                    self.pos += 12;
                    let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                    return Escape::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            _ => {}
        }
        // Lone high surrogate
        self.pos += 6;
        Escape::Char(char::REPLACEMENT_CHARACTER)
    }

    /// Skip an object or array. Returns whether it closed before the buffer ended.
    fn skip_nested(&mut self) -> bool {
        let mut depth = 0usize;
        let mut in_str = false;
        let mut escaped = false;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if in_str {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_str = false;
                }
                continue;
            }
            match b {
                b'"' => in_str = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

fn hex4(digits: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(digits).ok()?;
    if s.len() != 4 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

fn into_text(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
