//! URI reference splitting.
//!
//! Certificate URIs reach rules already split into scheme, host and path by
//! the policy engine's URL parser. That parser does not normalize: the host
//! keeps its case, brackets and `:port`, and the path is percent-decoded with
//! `.`/`..` segments left in place. [`UriReference::parse`] splits a string
//! the same way and accepts exactly the inputs that parser accepts, so a
//! configured `uri` value loads whenever the engine could have produced it.
//!
//! | Input | scheme | host | path |
//! |-------|--------|------|------|
//! | `HTTPS://Example.COM:443/a%20b/../c?q#f` | `https` | `Example.COM:443` | `/a b/../c` |
//! | `urn:uuid:1234` | `urn` | | |
//! | `//host/p` | | `host` | `/p` |

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;

/// A string the URL grammar rejects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// A byte below 0x20, or DEL, outside the fragment.
    #[error("invalid control character in URL")]
    ControlCharacter,

    /// The string starts with `:`.
    #[error("missing protocol scheme")]
    MissingScheme,

    /// A relative reference whose first segment looks like a scheme.
    #[error("first path segment in URL cannot contain colon")]
    ColonInFirstSegment,

    /// A `%` not followed by two hex digits, or an escape the host forbids.
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    /// An ASCII character that may not appear in a host.
    #[error("invalid character {0:?} in host name")]
    InvalidHostCharacter(char),

    /// A host starting with `[` has no closing `]`.
    #[error("missing ']' in host")]
    MissingBracket,

    /// Text after the host's last `:` is not a run of digits.
    #[error("invalid port {0:?} after host")]
    InvalidPort(String),

    /// Userinfo with a character outside the allowed set.
    #[error("invalid userinfo")]
    InvalidUserinfo,
}

/// Which component an escape sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Host,
    Zone,
    Path,
    Other,
}

/// The components of a URI reference that rules compare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UriReference {
    /// Lowercased scheme, empty for relative references.
    pub scheme: String,
    /// Everything after `scheme:` when it does not start with `/`.
    pub opaque: String,
    /// Host with `:port`, decoded but otherwise as written.
    pub host: String,
    /// Percent-decoded path.
    pub path: String,
}

impl UriReference {
    /// Split `raw` into its components.
    ///
    /// The empty string is a valid (empty) reference. Query and fragment are
    /// checked and then dropped; the query is not unescaped, so its escapes
    /// are never rejected.
    ///
    /// # Errors
    ///
    /// Returns the first grammar violation found.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let (reference, fragment) = match raw.split_once('#') {
            Some((reference, fragment)) => (reference, Some(fragment)),
            None => (raw, None),
        };
        let uri = Self::parse_reference(reference)?;
        if let Some(fragment) = fragment {
            unescape(fragment, Mode::Other)?;
        }
        Ok(uri)
    }

    fn parse_reference(reference: &str) -> Result<Self, UriError> {
        if reference.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return Err(UriError::ControlCharacter);
        }
        if reference == "*" {
            return Ok(Self {
                path: "*".to_owned(),
                ..Self::default()
            });
        }

        let (scheme, rest) = split_scheme(reference)?;
        let mut uri = Self {
            scheme: scheme.to_ascii_lowercase(),
            ..Self::default()
        };
        let rest = rest.split_once('?').map_or(rest, |(before, _)| before);

        if !rest.starts_with('/') {
            if !uri.scheme.is_empty() {
                uri.opaque = rest.to_owned();
                return Ok(uri);
            }
            let segment = rest.split_once('/').map_or(rest, |(first, _)| first);
            if segment.contains(':') {
                return Err(UriError::ColonInFirstSegment);
            }
        }

        let path = match rest.strip_prefix("//") {
            Some(after) if !uri.scheme.is_empty() || !rest.starts_with("///") => {
                let (authority, path) = after.find('/').map_or((after, ""), |i| after.split_at(i));
                uri.host = parse_authority(authority)?;
                path
            }
            _ => rest,
        };
        uri.path = unescape(path, Mode::Path)?.into_owned();
        Ok(uri)
    }

    /// `scheme://host` + path, the string a rule compares allow-lists against.
    #[must_use]
    pub fn reconstructed(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// `scheme ":"` prefix. A leading digit, `+`, `-` or `.` means no scheme.
fn split_scheme(raw: &str) -> Result<(&str, &str), UriError> {
    for (i, b) in raw.bytes().enumerate() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' => {}
            b'0'..=b'9' | b'+' | b'-' | b'.' if i > 0 => {}
            b':' if i == 0 => return Err(UriError::MissingScheme),
            b':' => return Ok((&raw[..i], &raw[i + 1..])),
            _ => break,
        }
    }
    Ok(("", raw))
}

fn parse_authority(authority: &str) -> Result<String, UriError> {
    let (userinfo, host) = match authority.rfind('@') {
        Some(at) => (Some(&authority[..at]), &authority[at + 1..]),
        None => (None, authority),
    };
    let host = parse_host(host)?;

    if let Some(userinfo) = userinfo {
        let valid = userinfo
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-._:~!$&'()*+,;=%@".contains(&b));
        if !valid {
            return Err(UriError::InvalidUserinfo);
        }
        unescape(userinfo, Mode::Other)?;
    }
    Ok(host)
}

fn parse_host(host: &str) -> Result<String, UriError> {
    if host.starts_with('[') {
        let close = host.rfind(']').ok_or(UriError::MissingBracket)?;
        check_port(&host[close + 1..])?;
        // IPv6 zone: `[fe80::1%25eth0]`
        if let Some(zone) = host[..close].find("%25") {
            let mut decoded = unescape(&host[..zone], Mode::Host)?.into_owned();
            decoded.push_str(&unescape(&host[zone..close], Mode::Zone)?);
            decoded.push_str(&unescape(&host[close..], Mode::Host)?);
            return Ok(decoded);
        }
    } else if let Some(colon) = host.rfind(':') {
        check_port(&host[colon..])?;
    }
    Ok(unescape(host, Mode::Host)?.into_owned())
}

/// Empty, or `:` followed by any number of digits.
fn check_port(port: &str) -> Result<(), UriError> {
    let valid = port.is_empty()
        || port
            .strip_prefix(':')
            .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(UriError::InvalidPort(port.to_owned()))
    }
}

/// ASCII bytes outside this set may not appear literally in a host.
fn host_byte_needs_escape(b: u8) -> bool {
    !(b.is_ascii_alphanumeric() || b"-_.~!$&'()*+,;=:[]<>\"".contains(&b))
}

fn unescape(s: &str, mode: Mode) -> Result<Cow<'_, str>, UriError> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            if matches!(mode, Mode::Host | Mode::Zone)
                && bytes[i].is_ascii()
                && host_byte_needs_escape(bytes[i])
            {
                return Err(UriError::InvalidHostCharacter(char::from(bytes[i])));
            }
            i += 1;
            continue;
        }

        let Some(decoded) = bytes.get(i + 1..i + 3).and_then(hex_pair) else {
            return Err(UriError::InvalidEscape(s[i..].chars().take(3).collect()));
        };
        let escape = &s[i..i + 3];
        let rejected = match mode {
            Mode::Host => decoded < 0x80 && escape != "%25",
            Mode::Zone => escape != "%25" && decoded != b' ' && host_byte_needs_escape(decoded),
            Mode::Path | Mode::Other => false,
        };
        if rejected {
            return Err(UriError::InvalidEscape(escape.to_owned()));
        }
        i += 3;
    }
    Ok(percent_decode_str(s).decode_utf8_lossy())
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = char::from(pair[0]).to_digit(16)?;
    let lo = char::from(pair[1]).to_digit(16)?;
    u8::try_from((hi << 4) | lo).ok()
}
