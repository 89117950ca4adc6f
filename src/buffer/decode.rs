//! Incremental decoding of PTY output into text

use bytes::{Buf, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Character encoding used to decode the child's output.
///
/// The PTY delivers raw bytes in arbitrarily sized chunks, so a multi-byte
/// character may be split across two reads. [`Decoder`] holds such partial
/// sequences back until the rest arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8. Invalid sequences are replaced with U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => f.write_str("utf-8"),
            Encoding::Latin1 => f.write_str("latin-1"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(format!("unsupported encoding: {other}")),
        }
    }
}

/// Stateful decoder that turns byte chunks into text.
#[derive(Debug)]
pub struct Decoder {
    encoding: Encoding,
    pending: BytesMut,
}

impl Decoder {
    /// Create a decoder for the given encoding
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            pending: BytesMut::new(),
        }
    }

    /// The encoding this decoder was built for
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decode a chunk, holding back any trailing incomplete character.
    pub fn decode(&mut self, data: &[u8]) -> String {
        match self.encoding {
            Encoding::Latin1 => data.iter().map(|&b| b as char).collect(),
            Encoding::Utf8 => {
                self.pending.extend_from_slice(data);
                let mut out = String::with_capacity(self.pending.len());

                loop {
                    match std::str::from_utf8(&self.pending) {
                        Ok(text) => {
                            out.push_str(text);
                            self.pending.clear();
                            break;
                        }
                        Err(e) => {
                            let valid = e.valid_up_to();
                            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                            match e.error_len() {
                                Some(bad) => {
                                    out.push(char::REPLACEMENT_CHARACTER);
                                    self.pending.advance(valid + bad);
                                }
                                None => {
                                    // Incomplete sequence at the tail; wait for more bytes
                                    self.pending.advance(valid);
                                    break;
                                }
                            }
                        }
                    }
                }

                out
            }
        }
    }

    /// Flush whatever is still pending at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
