//! String manipulation pipeline used by redirect template expansions.
//!
//! A pipeline is written after a parameter reference, e.g.
//! `{href/.*url=(.*)/$1|decodeURIComponent}`, and is parsed into steps:
//!
//! | Step | Syntax | Effect |
//! |------|--------|--------|
//! | Replace all | `//pattern/replacement` | regex replace, every match |
//! | Replace | `/pattern/replacement` | regex replace, first match |
//! | Extract | `:offset[:length]` | substring, negative values count from the end |
//! | Codec | `encodeURI`, `decodeURIComponent`, `encodeBase64`, ... | encode or decode |
//!
//! Steps are separated by `|`. Parsing stops at the first step that is not
//! recognized and the rest of the input is ignored.

use std::num::{IntErrorKind, ParseIntError};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use tracing::debug;

static REPLACE_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^//((?:\\.|[^\\/])+)/([^|]*)").expect("REPLACE_ALL: hardcoded regex is invalid")
});

static REPLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/((?:\\.|[^\\/])+)/([^|]*)").expect("REPLACE: hardcoded regex is invalid")
});

static EXTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:(-?\d*)(?::(-?\d*))?").expect("EXTRACT: hardcoded regex is invalid")
});

// Longer names first so `decodeURI` does not shadow `decodeURIComponent`
static CODEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(decodeuricomponent|encodeuricomponent|decodeuri|encodeuri|decodebase64|encodebase64)",
    )
    .expect("CODEC: hardcoded regex is invalid")
});

/// Characters `encodeURIComponent` leaves alone besides alphanumerics
const COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `encodeURI` additionally keeps the reserved url delimiters
const URI_SET: &AsciiSet = &COMPONENT_SET
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'#');

/// Bytes whose escapes `decodeURI` keeps encoded
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

/// Encoding or decoding step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    DecodeUri,
    EncodeUri,
    DecodeUriComponent,
    EncodeUriComponent,
    DecodeBase64,
    EncodeBase64,
}

impl Codec {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "decodeuri" => Some(Codec::DecodeUri),
            "encodeuri" => Some(Codec::EncodeUri),
            "decodeuricomponent" => Some(Codec::DecodeUriComponent),
            "encodeuricomponent" => Some(Codec::EncodeUriComponent),
            "decodebase64" => Some(Codec::DecodeBase64),
            "encodebase64" => Some(Codec::EncodeBase64),
            _ => None,
        }
    }

    pub fn apply(self, value: &str) -> String {
        match self {
            Codec::EncodeUriComponent => utf8_percent_encode(value, COMPONENT_SET).to_string(),
            Codec::EncodeUri => utf8_percent_encode(value, URI_SET).to_string(),
            Codec::DecodeUriComponent => percent_decode_str(value).decode_utf8_lossy().into_owned(),
            Codec::DecodeUri => decode_uri(value),
            Codec::EncodeBase64 => STANDARD.encode(value.as_bytes()),
            Codec::DecodeBase64 => {
                let trimmed = value.trim();
                match STANDARD
                    .decode(trimmed)
                    .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
                {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        debug!(error = %e, "value is not base64, left unchanged");
                        value.to_string()
                    }
                }
            }
        }
    }
}

/// Percent-decode everything except escapes of reserved delimiters.
fn decode_uri(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi * 16 + lo;
                if URI_RESERVED.contains(&decoded) {
                    out.extend_from_slice(&bytes[i..i + 3]);
                } else {
                    out.push(decoded);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Translate a `$1` / `$&` style replacement into the regex crate's syntax.
///
/// `groups` is the number of capture groups of the pattern. A two-digit
/// reference only counts as such when that group exists, otherwise `$10`
/// reads as group 1 followed by `0`. References to missing groups stay
/// literal.
fn convert_replacement(replacement: &str, groups: usize) -> String {
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let first = d as usize - '0' as usize;
                let two_digit = chars
                    .peek()
                    .and_then(|c| c.to_digit(10))
                    .map(|second| first * 10 + second as usize)
                    .filter(|&group| (1..=groups).contains(&group));
                if let Some(group) = two_digit {
                    chars.next();
                    out.push_str(&format!("${{{}}}", group));
                } else if (1..=groups).contains(&first) {
                    out.push_str(&format!("${{{}}}", first));
                } else {
                    out.push_str("$$");
                    out.push(d);
                }
            }
            Some('<') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '>' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if closed {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                } else {
                    out.push_str("$$<");
                    out.push_str(&name);
                }
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

/// One step of a pipeline
#[derive(Debug, Clone)]
pub enum Manipulation {
    /// Regex replacement, of every match when `all` is set
    Replace {
        regex: Regex,
        replacement: String,
        all: bool,
    },
    /// Substring by character offset and length
    Extract { offset: i64, length: i64 },
    Codec(Codec),
}

impl Manipulation {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Manipulation::Replace {
                regex,
                replacement,
                all,
            } => {
                if *all {
                    regex.replace_all(value, replacement.as_str()).into_owned()
                } else {
                    regex.replace(value, replacement.as_str()).into_owned()
                }
            }
            Manipulation::Extract { offset, length } => extract(value, *offset, *length),
            Manipulation::Codec(codec) => codec.apply(value),
        }
    }
}

/// Substring with slice-from-end semantics for negative values.
///
/// A length of 0 extracts to the end; a negative length trims that many
/// characters from the end of the value.
fn extract(value: &str, offset: i64, length: i64) -> String {
    let chars: Vec<char> = value.chars().collect();
    let n = chars.len() as i64;
    let start = if offset < 0 {
        (n + offset).max(0)
    } else {
        offset.min(n)
    };
    let end = match length {
        0 => n,
        l if l < 0 => (n + l).max(0),
        l => start.saturating_add(l).min(n),
    };
    if start >= end {
        return String::new();
    }
    chars[start as usize..end as usize].iter().collect()
}

/// Ordered list of manipulations applied left to right
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<Manipulation>,
}

impl Pipeline {
    /// Parse a manipulation chain. Never fails: parsing stops at the first
    /// unrecognized step and keeps the steps read so far.
    pub fn parse(input: &str) -> Self {
        let mut steps = Vec::new();
        let mut rest = input;

        loop {
            rest = rest.strip_prefix('|').unwrap_or(rest);
            if rest.is_empty() {
                break;
            }

            let replace = REPLACE_ALL
                .captures(rest)
                .map(|caps| (caps, true))
                .or_else(|| REPLACE.captures(rest).map(|caps| (caps, false)));
            if let Some((caps, all)) = replace {
                let pattern = caps[1].replace("\\/", "/");
                let regex = match Regex::new(&pattern) {
                    Ok(regex) => regex,
                    Err(e) => {
                        debug!(pattern = %pattern, error = %e, "invalid manipulation regex, ignoring remainder");
                        break;
                    }
                };
                let replacement = convert_replacement(&caps[2], regex.captures_len() - 1);
                steps.push(Manipulation::Replace {
                    regex,
                    replacement,
                    all,
                });
                rest = &rest[caps[0].len()..];
                continue;
            }

            if let Some(caps) = EXTRACT.captures(rest) {
                let offset = parse_signed(caps.get(1).map_or("", |m| m.as_str()));
                let length = parse_signed(caps.get(2).map_or("", |m| m.as_str()));
                steps.push(Manipulation::Extract { offset, length });
                rest = &rest[caps[0].len()..];
                continue;
            }

            if let Some(m) = CODEC.find(rest) {
                if let Some(codec) = Codec::from_keyword(m.as_str()) {
                    steps.push(Manipulation::Codec(codec));
                    rest = &rest[m.end()..];
                    continue;
                }
            }

            debug!(remainder = %rest, "unrecognized manipulation, ignoring remainder");
            break;
        }

        Self { steps }
    }

    pub fn apply(&self, value: &str) -> String {
        self.steps
            .iter()
            .fold(value.to_string(), |acc, step| step.apply(&acc))
    }

    pub fn steps(&self) -> &[Manipulation] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Out-of-range numbers clamp to the `i64` bounds.
fn parse_signed(value: &str) -> i64 {
    match value {
        "" | "-" => 0,
        v => v.parse().unwrap_or_else(|e: ParseIntError| match e.kind() {
            IntErrorKind::NegOverflow => i64::MIN,
            IntErrorKind::PosOverflow => i64::MAX,
            _ => 0,
        }),
    }
}
