//! Canonicalizers for certificate-matching condition values.
//!
//! Each function validates one configured string and returns the exact
//! representation the policy engine compares against. They are total: any
//! input, however malformed, yields `Ok` or a [`ValidationError`].
//!
//! | Condition | Output |
//! |-----------|--------|
//! | `fingerprint` | 64 lowercase hex chars (colon form is folded) |
//! | `spki_hash` | verbatim |
//! | `email` | verbatim |
//! | `dns` | verbatim |
//! | `ip` | verbatim (no IPv6 re-compression) |
//! | `uri` | verbatim |

use std::net::IpAddr;
use std::sync::OnceLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;

use super::mailbox;
use crate::error::ValidationError;
use crate::uri::UriReference;

/// Size of a SHA-256 digest in bytes.
pub const SHA256_LEN: usize = 32;

const FINGERPRINT_FORMAT: &str = "a SHA-256 fingerprint as 64 lowercase hex characters \
     or 32 colon-separated uppercase hex bytes";
const SPKI_FORMAT: &str = "a base64-encoded SHA-256 hash";
const EMAIL_FORMAT: &str = "a valid email address";
const DNS_FORMAT: &str = "a valid DNS name";
const IP_FORMAT: &str = "a valid IP address";
const URI_FORMAT: &str = "a valid URI";

/// Canonicalize a certificate fingerprint.
///
/// Accepts the short form (`^[0-9a-f]{64}$`, returned unchanged) and the long
/// form (`^[0-9A-F]{2}(:[0-9A-F]{2}){31}$`, colons removed and lowercased).
/// Mixed case, lowercase with colons and uppercase without colons are all
/// rejected.
pub fn fingerprint(raw: &str) -> Result<String, ValidationError> {
    static SHORT_RE: OnceLock<Regex> = OnceLock::new();
    static LONG_RE: OnceLock<Regex> = OnceLock::new();

    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }

    let short_re = SHORT_RE.get_or_init(|| Regex::new("^[0-9a-f]{64}$").expect("static regex"));
    if short_re.is_match(raw) {
        return Ok(raw.to_owned());
    }

    let long_re = LONG_RE
        .get_or_init(|| Regex::new("^[0-9A-F]{2}(:[0-9A-F]{2}){31}$").expect("static regex"));
    if long_re.is_match(raw) {
        return Ok(raw.replace(':', "").to_ascii_lowercase());
    }

    Err(ValidationError::Malformed {
        expected: FINGERPRINT_FORMAT,
    })
}

/// Validate a base64 (standard alphabet, padded) SHA-256 SPKI hash.
///
/// Encodings with non-zero trailing bits or embedded line breaks are
/// rejected even though some decoders accept them. The engine compares
/// against the canonical encoding of the digest, which never has either, so
/// such a value could never match.
pub fn spki_hash(raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    match STANDARD.decode(raw) {
        Ok(bytes) if bytes.len() == SHA256_LEN => Ok(raw.to_owned()),
        _ => Err(ValidationError::Malformed {
            expected: SPKI_FORMAT,
        }),
    }
}

/// Validate a SAN email entry: exactly one RFC 5322 mailbox.
pub fn san_email(raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    if mailbox::is_single_mailbox(raw) {
        Ok(raw.to_owned())
    } else {
        Err(ValidationError::Malformed {
            expected: EMAIL_FORMAT,
        })
    }
}

/// Validate a SAN DNS entry.
///
/// Labels may contain underscores and the name may end in `.` or `_`. This
/// is looser than RFC 1123 hostnames. Tightening it would reject
/// allow-lists that load today.
pub fn san_dns(raw: &str) -> Result<String, ValidationError> {
    static DNS_RE: OnceLock<Regex> = OnceLock::new();

    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    let dns_re = DNS_RE.get_or_init(|| {
        Regex::new(
            r"^([a-zA-Z0-9_]{1}[a-zA-Z0-9_-]{0,62}){1}(\.[a-zA-Z0-9_]{1}[a-zA-Z0-9_-]{0,62})*[\._]?$",
        )
        .expect("static regex")
    });
    if dns_re.is_match(raw) {
        Ok(raw.to_owned())
    } else {
        Err(ValidationError::Malformed {
            expected: DNS_FORMAT,
        })
    }
}

/// Validate a SAN IP entry (IPv4 dotted quad or IPv6 literal, no zone).
///
/// The value is not normalized: `::1` and `0:0:0:0:0:0:0:1` stay distinct.
pub fn san_ip(raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    raw.parse::<IpAddr>()
        .map(|_| raw.to_owned())
        .map_err(|_| ValidationError::Malformed {
            expected: IP_FORMAT,
        })
}

/// Validate a SAN URI entry: any URI reference the engine's URL parser
/// accepts, including the empty string.
///
/// The configured string is kept verbatim. At evaluation time it is compared
/// against `scheme://host` + path of each certificate URI, so a configured
/// value carrying a query or fragment can never match.
pub fn san_uri(raw: &str) -> Result<String, ValidationError> {
    UriReference::parse(raw)
        .map(|_| raw.to_owned())
        .map_err(|_| ValidationError::Malformed {
            expected: URI_FORMAT,
        })
}
