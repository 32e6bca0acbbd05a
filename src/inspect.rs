//! Certificate fact extraction.
//!
//! Derives, from a leaf certificate, the same facts a compiled
//! `client_certificate` rule computes at evaluation time. Operators use it to
//! find the exact strings an allow-list must contain. Nothing here evaluates
//! rules.
//!
//! # SAN URI reconstruction
//!
//! Rules compare allow-lists against `scheme://host` + path of each SAN URI,
//! not the raw SAN. [`SanUri::reconstructed`] shows that string, built from
//! the same components the engine sees:
//!
//! - the scheme is lowercased;
//! - the host is kept as written, with its case, brackets and `:port`;
//! - the path is percent-decoded and `.`/`..` segments are kept;
//! - query and fragment are dropped;
//! - opaque URIs such as `urn:a:b` contribute no host or path.
//!
//! A SAN URI with a host that is not a valid domain (empty label, trailing
//! `.`, or characters outside printable ASCII) makes the whole certificate
//! unparseable for the engine, and is a [`Error::Certificate`] here.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;

use crate::uri::UriReference;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Certificate facts
// ─────────────────────────────────────────────────────────────────────────────

/// Facts derived from one leaf certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateFacts {
    /// Lowercase hex SHA-256 of the DER encoding.
    pub fingerprint: String,

    /// Base64 SHA-256 of the raw `SubjectPublicKeyInfo`.
    pub spki_hash: String,

    /// Subject Alternative Name: email entries.
    pub san_email_addresses: Vec<String>,

    /// Subject Alternative Name: DNS entries.
    pub san_dns_names: Vec<String>,

    /// Subject Alternative Name: IP entries, in textual form.
    pub san_ip_addresses: Vec<String>,

    /// Subject Alternative Name: URI entries.
    pub san_uris: Vec<SanUri>,
}

impl CertificateFacts {
    /// Derive facts from a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if the bytes are not a certificate or a
    /// SAN entry is malformed.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate: {e}")))?;

        let mut facts = Self {
            fingerprint: hex::encode(sha256(der)),
            spki_hash: STANDARD.encode(sha256(cert.public_key().raw)),
            ..Self::default()
        };
        facts.extract_sans(&cert)?;
        Ok(facts)
    }

    /// Derive facts from the first certificate of a PEM bundle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if no PEM block can be decoded, or on any
    /// [`from_der`](Self::from_der) failure.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, block) = parse_x509_pem(pem)
            .map_err(|e| Error::Certificate(format!("Failed to decode PEM: {e}")))?;
        Self::from_der(&block.contents)
    }

    /// Derive facts from PEM or DER bytes, whichever `bytes` holds.
    ///
    /// # Errors
    ///
    /// See [`from_pem`](Self::from_pem) and [`from_der`](Self::from_der).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let trimmed = bytes.trim_ascii_start();
        if trimmed.starts_with(b"-----BEGIN") {
            Self::from_pem(trimmed)
        } else {
            Self::from_der(bytes)
        }
    }

    fn extract_sans(&mut self, cert: &X509Certificate<'_>) -> Result<()> {
        let san = cert
            .subject_alternative_name()
            .map_err(|e| Error::Certificate(format!("Malformed SAN extension: {e}")))?;
        let Some(san) = san else {
            return Ok(());
        };

        for name in &san.value.general_names {
            match name {
                GeneralName::RFC822Name(email) => self.san_email_addresses.push((*email).to_owned()),
                GeneralName::DNSName(dns) => self.san_dns_names.push((*dns).to_owned()),
                GeneralName::IPAddress(bytes) => self.san_ip_addresses.push(format_ip(bytes)?),
                GeneralName::URI(uri) => self.san_uris.push(SanUri::parse(uri)?),
                _ => {}
            }
        }
        Ok(())
    }
}

fn sha256(bytes: &[u8]) -> impl AsRef<[u8]> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Render a SAN IP. IPv4-mapped IPv6 addresses print in dotted-quad form.
fn format_ip(bytes: &[u8]) -> Result<String> {
    let ip = match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().map_err(|_| bad_ip(bytes))?;
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().map_err(|_| bad_ip(bytes))?;
            let v6 = Ipv6Addr::from(octets);
            v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4)
        }
        _ => return Err(bad_ip(bytes)),
    };
    Ok(ip.to_string())
}

fn bad_ip(bytes: &[u8]) -> Error {
    Error::Certificate(format!(
        "cannot parse SAN IP address of length {}",
        bytes.len()
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// SAN URIs
// ─────────────────────────────────────────────────────────────────────────────

/// A SAN URI split into the components rules compare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanUri {
    /// The SAN entry as stored.
    pub raw: String,
    /// Scheme, empty for relative references.
    pub scheme: String,
    /// Host, with `:port` when present.
    pub host: String,
    /// Path, empty for opaque URIs such as `urn:a:b`.
    pub path: String,
}

impl SanUri {
    /// Split a SAN URI into scheme, host and path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if `raw` is not a URI reference or its
    /// host is not a valid domain.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &dyn fmt::Display| {
            Error::Certificate(format!("cannot parse SAN URI {raw:?}: {reason}"))
        };
        let reference = UriReference::parse(raw).map_err(|e| invalid(&e))?;
        if !reference.host.is_empty() && !is_domain(&reference.host) {
            return Err(invalid(&"invalid domain"));
        }
        Ok(Self {
            raw: raw.to_owned(),
            scheme: reference.scheme,
            host: reference.host,
            path: reference.path,
        })
    }

    /// The string a `uri` allow-list entry must equal to match this SAN.
    #[must_use]
    pub fn reconstructed(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// Non-empty dot-separated labels of printable ASCII, no trailing dot.
fn is_domain(host: &str) -> bool {
    host.split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| ('!'..='~').contains(&c)))
}

impl fmt::Display for SanUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reconstructed())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
