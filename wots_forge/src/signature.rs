// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Signatures and their textual wire form.

use crate::chain::Digest;
use crate::error::{Error, Result};
use crate::literal::{parse_bytes_literal, parse_elements, Element};
use crate::params::{Params, HS};

/// One public chain end per chain.
pub type PublicKey = Vec<Digest>;

/// WOTS Signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub elements: Vec<Digest>,
}

/// How a signature list is written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureEncoding {
    /// `['00ab..', ...]`
    Hex,
    /// `[b'\x00\xab..', ...]`, Python's `repr()` of a list of bytes.
    Bytes,
    /// `[[0, 171, ...], ...]`
    Ints,
}

impl Default for SignatureEncoding {
    fn default() -> Self {
        SignatureEncoding::Bytes
    }
}

impl Element {
    /// Decodes the element into a digest. Strings are read as hex, or as a bytes
    /// literal when quoted twice.
    pub fn to_digest(&self) -> Result<Digest> {
        let bytes = match self {
            Element::Bytes(b) | Element::Ints(b) => b.clone(),
            Element::Str(s) => {
                let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
                match hex::decode(&compact) {
                    Ok(b) => b,
                    Err(_) if compact.starts_with("b'") || compact.starts_with("b\"") => {
                        parse_bytes_literal(s.as_bytes())?
                    }
                    Err(e) => {
                        return Err(Error::MalformedLiteral(format!(
                            "element is not hex: {}",
                            e
                        )))
                    }
                }
            }
        };
        if bytes.len() != HS {
            return Err(Error::SignatureShapeMismatch {
                what: "bytes per element",
                expected: HS,
                found: bytes.len(),
            });
        }

        let mut digest = [0u8; HS];
        digest.copy_from_slice(&bytes);
        return Ok(digest);
    }
}

impl Signature {
    pub fn new(elements: Vec<Digest>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Builds a signature from parsed list elements, checking its shape against `params`.
    pub fn from_elements(elements: &[Element], params: &Params) -> Result<Self> {
        if elements.len() != params.n() {
            return Err(Error::SignatureShapeMismatch {
                what: "elements",
                expected: params.n(),
                found: elements.len(),
            });
        }
        let elements = elements
            .iter()
            .map(Element::to_digest)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Self { elements });
    }

    /// Parses a complete `[ ... ]` literal as received from the service.
    pub fn from_literal(raw: &[u8], params: &Params) -> Result<Self> {
        let elements = parse_elements(raw)?;
        return Self::from_elements(&elements, params);
    }

    /// Writes the signature as a list literal, without line terminator.
    pub fn to_literal(&self, encoding: SignatureEncoding) -> String {
        let mut out = String::with_capacity(self.len() * (4 * HS + 8));
        out.push('[');
        for (i, e) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match encoding {
                SignatureEncoding::Hex => {
                    out.push('\'');
                    out.push_str(&hex::encode(e));
                    out.push('\'');
                }
                SignatureEncoding::Bytes => out.push_str(&bytes_repr(e)),
                SignatureEncoding::Ints => {
                    out.push('[');
                    for (j, b) in e.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&b.to_string());
                    }
                    out.push(']');
                }
            }
        }
        out.push(']');
        return out;
    }
}

/// A message as sent to the service: lowercase hex and a newline.
pub fn message_line(msg: &[u8]) -> Vec<u8> {
    let mut line = hex::encode(msg).into_bytes();
    line.push(b'\n');
    return line;
}

/// Python's `repr()` of a bytes object.
pub fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(bytes.len() * 4 + 3);
    out.push('b');
    out.push(quote);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push(quote);
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::hash;
    use crate::params::NITWIT;

    fn sample() -> Signature {
        let mut elements = Vec::new();
        let mut x = hash(b"sample");
        for _ in 0..NITWIT.n() {
            elements.push(x);
            x = hash(&x);
        }
        // Bytes that need quoting and escaping in the repr form.
        elements[0] = *b"it's \\ a \"quoted\" \n\t\r\x00\x7f\xff[]123456";
        Signature::new(elements)
    }

    #[test]
    fn repr_matches_python() {
        assert_eq!(bytes_repr(b"abc"), "b'abc'");
        assert_eq!(bytes_repr(b"it's"), "b\"it's\"");
        assert_eq!(bytes_repr(b"'\""), "b'\\'\"'");
        assert_eq!(bytes_repr(b"\x00\x7f\xff\\\n"), "b'\\x00\\x7f\\xff\\\\\\n'");
    }

    #[test]
    fn every_encoding_parses_back() {
        let sig = sample();
        for &enc in &[
            SignatureEncoding::Hex,
            SignatureEncoding::Bytes,
            SignatureEncoding::Ints,
        ] {
            let text = sig.to_literal(enc);
            let parsed = Signature::from_literal(text.as_bytes(), &NITWIT).unwrap();
            assert_eq!(parsed, sig, "encoding {:?}", enc);
        }
    }

    #[test]
    fn mixed_element_encodings() {
        let sig = sample();
        let mut parts = Vec::new();
        for (i, e) in sig.elements.iter().enumerate() {
            parts.push(match i % 4 {
                0 => format!("\"{}\"", hex::encode(e)),
                1 => bytes_repr(e),
                2 => format!("{:?}", e.to_vec()),
                _ => format!(
                    "'{}'",
                    bytes_repr(e).replace('\\', "\\\\").replace('\'', "\\'")
                ),
            });
        }
        let text = format!("[{}]", parts.join(",\n "));
        let parsed = Signature::from_literal(text.as_bytes(), &NITWIT).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn shape_mismatch() {
        let sig = sample();
        let mut short = sig.clone();
        short.elements.pop();
        let text = short.to_literal(SignatureEncoding::Hex);
        assert!(matches!(
            Signature::from_literal(text.as_bytes(), &NITWIT),
            Err(Error::SignatureShapeMismatch {
                what: "elements",
                expected: 66,
                found: 65
            })
        ));

        let text = sig.to_literal(SignatureEncoding::Hex).replacen("'", "'00", 1);
        assert!(matches!(
            Signature::from_literal(text.as_bytes(), &NITWIT),
            Err(Error::SignatureShapeMismatch {
                what: "bytes per element",
                expected: 32,
                found: 33
            })
        ));
    }

    #[test]
    fn non_hex_string_is_malformed() {
        let e = Element::Str("not hex".into());
        assert!(matches!(e.to_digest(), Err(Error::MalformedLiteral(_))));
    }

    #[test]
    fn message_line_is_lowercase_hex() {
        assert_eq!(message_line(&[0xab, 0x01]), b"ab01\n".to_vec());
    }
}
