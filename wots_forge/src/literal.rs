// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Extraction of one balanced, bracketed literal from a live byte stream.
//!
//! The stream also carries prompt text, so the literal's length is unknown up front.
//! [`LiteralReader`] is fed one byte at a time and tracks bracket depth while skipping
//! brackets inside quoted strings. [`parse_elements`] then turns the captured bytes into
//! a list of elements (quoted strings, bytes literals or lists of integers).

use std::time::Instant;

use crate::error::{Error, Result};
use crate::transport::{Inbox, Transport};

const BACKSLASH: u8 = b'\\';

/// Upper bound on the size of a single literal.
pub const MAX_LITERAL_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SeekingOpen,
    InLiteral {
        depth: usize,
        /// Active quote character, if inside a quoted region.
        quote: Option<u8>,
        escape: bool,
    },
    Done,
}

/// What happened to the byte passed to [`LiteralReader::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Outside the literal, not captured.
    Skipped,
    /// Captured, literal still open.
    Consumed,
    /// Captured, and it closed the literal.
    Complete,
}

#[derive(Debug, Clone)]
pub struct LiteralReader {
    open: u8,
    close: u8,
    state: State,
    preamble: Vec<u8>,
    captured: Vec<u8>,
    max_len: usize,
}

impl LiteralReader {
    pub fn new(open: u8, close: u8) -> Self {
        Self {
            open,
            close,
            state: State::SeekingOpen,
            preamble: Vec::new(),
            captured: Vec::new(),
            max_len: MAX_LITERAL_LEN,
        }
    }

    /// Reader for a `[ ... ]` list.
    pub fn brackets() -> Self {
        Self::new(b'[', b']')
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        return self;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Bytes skipped while looking for the open delimiter.
    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }

    /// Bytes captured so far, starting with the open delimiter.
    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    /// The complete literal, or `None` if the closing delimiter was not seen yet.
    pub fn into_literal(self) -> Option<Vec<u8>> {
        match self.state {
            State::Done => Some(self.captured),
            _ => None,
        }
    }

    /// Advances the state machine by one byte.
    pub fn push(&mut self, byte: u8) -> Result<Step> {
        let (depth, quote, escape) = match self.state {
            State::Done => {
                return Err(Error::MalformedLiteral(
                    "byte pushed after literal end".into(),
                ))
            }
            State::SeekingOpen => {
                if byte != self.open {
                    self.preamble.push(byte);
                    return Ok(Step::Skipped);
                }
                self.captured.push(byte);
                self.state = State::InLiteral {
                    depth: 1,
                    quote: None,
                    escape: false,
                };
                return Ok(Step::Consumed);
            }
            State::InLiteral {
                depth,
                quote,
                escape,
            } => (depth, quote, escape),
        };

        if self.captured.len() >= self.max_len {
            return Err(Error::MalformedLiteral(format!(
                "literal exceeds {} bytes",
                self.max_len
            )));
        }
        self.captured.push(byte);

        self.state = match quote {
            Some(q) => {
                if escape {
                    State::InLiteral {
                        depth,
                        quote,
                        escape: false,
                    }
                } else if byte == BACKSLASH {
                    State::InLiteral {
                        depth,
                        quote,
                        escape: true,
                    }
                } else if byte == q {
                    State::InLiteral {
                        depth,
                        quote: None,
                        escape: false,
                    }
                } else {
                    self.state
                }
            }
            None => {
                if byte == b'\'' || byte == b'"' {
                    State::InLiteral {
                        depth,
                        quote: Some(byte),
                        escape: false,
                    }
                } else if byte == self.open {
                    State::InLiteral {
                        depth: depth + 1,
                        quote: None,
                        escape: false,
                    }
                } else if byte == self.close && depth == 1 {
                    State::Done
                } else if byte == self.close {
                    State::InLiteral {
                        depth: depth - 1,
                        quote: None,
                        escape: false,
                    }
                } else {
                    self.state
                }
            }
        };

        if self.state == State::Done {
            return Ok(Step::Complete);
        }
        return Ok(Step::Consumed);
    }
}

/// A literal read off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// Prompt text skipped before the open delimiter.
    pub preamble: Vec<u8>,
    /// The literal itself, delimiters included.
    pub raw: Vec<u8>,
}

/// Pulls bytes from `inbox` until `reader` completes a literal.
///
/// Bytes following the closing delimiter are left in the inbox. If the peer closes the
/// connection before the literal opened this is reported as [`Error::TransportClosed`];
/// once inside the literal it is [`Error::MalformedLiteral`].
///
/// Every byte taken from the inbox is kept in `reader`, so after a
/// [`Error::TransportTimeout`] calling again with the same reader picks up where the
/// first call stopped.
pub fn read_literal<T: Transport>(
    inbox: &mut Inbox<T>,
    reader: &mut LiteralReader,
    deadline: Instant,
) -> Result<Literal> {
    loop {
        let byte = match inbox.next_byte(deadline) {
            Ok(b) => b,
            Err(Error::TransportClosed) if reader.state() != State::SeekingOpen => {
                return Err(Error::MalformedLiteral(format!(
                    "stream closed before literal complete ({} bytes read)",
                    reader.captured().len()
                )))
            }
            Err(e) => return Err(e),
        };

        if reader.push(byte)? == Step::Complete {
            return Ok(Literal {
                preamble: reader.preamble.clone(),
                raw: reader.captured.clone(),
            });
        }
    }
}

/// One entry of a parsed list literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A quoted string, `'...'` or `"..."`.
    Str(String),
    /// A bytes literal, `b'...'`.
    Bytes(Vec<u8>),
    /// A list of integers in `0..=255`, `[1, 2, ...]`.
    Ints(Vec<u8>),
}

/// Parses a complete `[ ... ]` literal into its elements.
pub fn parse_elements(raw: &[u8]) -> Result<Vec<Element>> {
    let mut cur = Cursor { bytes: raw, pos: 0 };
    cur.skip_ws();
    let elements = cur.list(|c| c.element())?;
    cur.skip_ws();
    if cur.pos != raw.len() {
        return Err(cur.error("trailing bytes after literal"));
    }
    return Ok(elements);
}

/// Parses a single bytes literal such as `b'\x00ab'`.
pub fn parse_bytes_literal(text: &[u8]) -> Result<Vec<u8>> {
    let mut cur = Cursor { bytes: text, pos: 0 };
    cur.skip_ws();
    let out = match cur.element()? {
        Element::Bytes(b) => b,
        _ => return Err(cur.error("expected a bytes literal")),
    };
    cur.skip_ws();
    if cur.pos != text.len() {
        return Err(cur.error("trailing bytes after bytes literal"));
    }
    return Ok(out);
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn error(&self, what: &str) -> Error {
        Error::MalformedLiteral(format!("{} at offset {}", what, self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        let b = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        self.pos += 1;
        return Ok(b);
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.bump()? != byte {
            self.pos -= 1;
            return Err(self.error(&format!("expected '{}'", byte as char)));
        }
        return Ok(());
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// `[ item, item, ... ]`, a trailing comma is accepted.
    fn list<T, F>(&mut self, mut item: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.pos += 1;
                return Ok(items);
            }
            items.push(item(self)?);
            self.skip_ws();
            match self.bump()? {
                b',' => continue,
                b']' => return Ok(items),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected ',' or ']'"));
                }
            }
        }
    }

    fn element(&mut self) -> Result<Element> {
        match self.peek() {
            Some(b'\'') | Some(b'"') => {
                let bytes = self.quoted(true)?;
                let s = String::from_utf8(bytes).map_err(|_| self.error("string is not UTF-8"))?;
                Ok(Element::Str(s))
            }
            Some(b'b') | Some(b'B') => {
                self.pos += 1;
                match self.peek() {
                    Some(b'\'') | Some(b'"') => Ok(Element::Bytes(self.quoted(false)?)),
                    _ => Err(self.error("expected quote after bytes prefix")),
                }
            }
            Some(b'[') => Ok(Element::Ints(self.list(|c| c.int())?)),
            Some(_) => Err(self.error("unexpected element")),
            None => Err(self.error("unexpected end")),
        }
    }

    fn int(&mut self) -> Result<u8> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected integer"));
        }
        return std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| self.error("integer outside 0..=255"));
    }

    /// A quoted run with Python escape sequences resolved.
    /// In `text` mode numeric escapes name code points and are written out as UTF-8,
    /// otherwise they are single bytes.
    fn quoted(&mut self, text: bool) -> Result<Vec<u8>> {
        let quote = self.bump()?;
        let mut out = Vec::new();
        loop {
            let b = self
                .bump()
                .map_err(|_| self.error("unterminated quoted string"))?;
            if b == quote {
                return Ok(out);
            }
            if b != BACKSLASH {
                out.push(b);
                continue;
            }
            let e = self
                .bump()
                .map_err(|_| self.error("unterminated escape"))?;
            let code = match e {
                b'\n' => continue,
                b'\\' | b'\'' | b'"' => e as u32,
                b'n' => 0x0a,
                b'r' => 0x0d,
                b't' => 0x09,
                b'a' => 0x07,
                b'b' => 0x08,
                b'f' => 0x0c,
                b'v' => 0x0b,
                b'x' => self.hex_escape(2)?,
                b'u' if text => self.hex_escape(4)?,
                b'U' if text => self.hex_escape(8)?,
                b'0'..=b'7' => {
                    let mut v = (e - b'0') as u32;
                    for _ in 0..2 {
                        match self.peek() {
                            Some(d @ b'0'..=b'7') => {
                                v = v * 8 + (d - b'0') as u32;
                                self.pos += 1;
                            }
                            _ => break,
                        }
                    }
                    v
                }
                // Unknown escapes are kept verbatim.
                _ => {
                    out.push(BACKSLASH);
                    out.push(e);
                    continue;
                }
            };

            if text {
                let c = std::char::from_u32(code)
                    .ok_or_else(|| self.error("escape is not a valid code point"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            } else {
                out.push((code & 0xff) as u8);
            }
        }
    }

    /// `count` hex digits following `\x`, `\u` or `\U`.
    fn hex_escape(&mut self, count: usize) -> Result<u32> {
        let mut v = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .ok()
                .and_then(hex_value)
                .ok_or_else(|| self.error("invalid hex escape"))?;
            v = (v << 4) | digit as u32;
        }
        return Ok(v);
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|v| v as u8)
}
