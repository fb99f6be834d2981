//! Text encodings and decode-error policies for text sinks and captures.

use std::fmt;
use std::str::FromStr;

use crate::error::TeeError;

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }
}

impl FromStr for Encoding {
    type Err = TeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(TeeError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with bytes the encoding can't decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fail.
    Strict,
    /// Substitute U+FFFD.
    #[default]
    Replace,
    /// Drop the bytes.
    Ignore,
    /// Substitute `\xNN` escapes.
    BackslashReplace,
}

impl ErrorPolicy {
    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
            Self::BackslashReplace => "backslashreplace",
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = TeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            "ignore" => Ok(Self::Ignore),
            "backslashreplace" => Ok(Self::BackslashReplace),
            _ => Err(TeeError::UnknownErrorPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes `bytes` as `encoding`, handling bad input per `policy`.
///
/// # Errors
///
/// Returns [`TeeError::Decode`] on the first undecodable byte when the
/// policy is [`ErrorPolicy::Strict`].
///
/// # Examples
///
/// ```
/// use incsh::tee::{decode, Encoding, ErrorPolicy};
///
/// let text = decode(b"ok\xff", Encoding::Utf8, ErrorPolicy::BackslashReplace).unwrap();
/// assert_eq!(text, "ok\\xff");
/// ```
pub fn decode(bytes: &[u8], encoding: Encoding, policy: ErrorPolicy) -> Result<String, TeeError> {
    match encoding {
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        Encoding::Ascii => {
            let mut out = String::with_capacity(bytes.len());
            for (offset, &b) in bytes.iter().enumerate() {
                if b.is_ascii() {
                    out.push(char::from(b));
                } else {
                    substitute(&mut out, encoding, policy, b, offset)?;
                }
            }
            Ok(out)
        }
        Encoding::Utf8 => decode_utf8(bytes, policy),
    }
}

fn decode_utf8(bytes: &[u8], policy: ErrorPolicy) -> Result<String, TeeError> {
    let mut out = String::with_capacity(bytes.len());
    let mut offset = 0;
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return Ok(out);
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix is well-formed
                out.push_str(&String::from_utf8_lossy(valid));
                offset += valid.len();

                let bad_len = e.error_len().unwrap_or(after.len());
                let (bad, tail) = after.split_at(bad_len);
                if policy == ErrorPolicy::Replace {
                    out.push(char::REPLACEMENT_CHARACTER);
                } else {
                    for (i, &b) in bad.iter().enumerate() {
                        substitute(&mut out, Encoding::Utf8, policy, b, offset + i)?;
                    }
                }
                offset += bad_len;
                rest = tail;
            }
        }
    }
}

fn substitute(
    out: &mut String,
    encoding: Encoding,
    policy: ErrorPolicy,
    byte: u8,
    offset: usize,
) -> Result<(), TeeError> {
    match policy {
        ErrorPolicy::Strict => {
            return Err(TeeError::Decode {
                encoding: encoding.name(),
                byte,
                offset,
            });
        }
        ErrorPolicy::Replace => out.push(char::REPLACEMENT_CHARACTER),
        ErrorPolicy::Ignore => {}
        ErrorPolicy::BackslashReplace => out.push_str(&format!("\\x{byte:02x}")),
    }
    Ok(())
}
