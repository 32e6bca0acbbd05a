//! Certificate facts derived at evaluation time.
//!
//! Every certificate-matching rule starts with the same prologue: parse the
//! first certificate of the presented chain, then bind the facts condition
//! constraints compare against. If the chain is empty the engine leaves all
//! of these undefined, and every constraint that reads them fails.

use crate::rego::{Body, Statement, Term};

/// Engine-supplied root holding the request context.
pub const INPUT: &str = "input";

/// The parsed leaf certificate.
pub const CERT: &str = "cert";
/// Lowercase hex SHA-256 of the leaf's DER bytes.
pub const FINGERPRINT: &str = "fingerprint";
/// Base64 SHA-256 of the leaf's raw `SubjectPublicKeyInfo`.
pub const SPKI_HASH: &str = "spki_hash";
/// SAN email addresses.
pub const SAN_EMAIL_ADDRESSES: &str = "san_email_addresses";
/// SAN DNS names.
pub const SAN_DNS_NAMES: &str = "san_dns_names";
/// SAN IP addresses.
pub const SAN_IP_ADDRESSES: &str = "san_ip_addresses";
/// SAN URIs, as parsed URL objects exposing `Scheme`, `Host` and `Path`.
pub const SAN_URIS: &str = "san_uris";

/// Roots a rule body may read without binding them first.
pub const GLOBALS: &[&str] = &[INPUT];

/// Build a fresh copy of the fact-derivation prologue.
///
/// ```text
/// cert := crypto.x509.parse_certificates(trim_space(input.http.client_certificate.leaf))[0]
/// fingerprint := crypto.sha256(base64.decode(cert.Raw))
/// spki_hash := base64.encode(hex.decode(crypto.sha256(base64.decode(cert.RawSubjectPublicKeyInfo))))
/// san_email_addresses := cert.EmailAddresses
/// san_dns_names := cert.DNSNames
/// san_ip_addresses := cert.IPAddresses
/// san_uris := cert.URIs
/// ```
#[must_use]
pub fn prologue() -> Body {
    let leaf = Term::var(INPUT)
        .field("http")
        .field("client_certificate")
        .field("leaf");
    let cert = || Term::var(CERT);
    let sha256_of = |field: &str| {
        Term::call(
            "crypto.sha256",
            [Term::call("base64.decode", [cert().field(field)])],
        )
    };

    vec![
        Statement::assign(
            CERT,
            Term::call(
                "crypto.x509.parse_certificates",
                [Term::call("trim_space", [leaf])],
            )
            .index(Term::Number(0)),
        ),
        Statement::assign(FINGERPRINT, sha256_of("Raw")),
        Statement::assign(
            SPKI_HASH,
            Term::call(
                "base64.encode",
                [Term::call("hex.decode", [sha256_of("RawSubjectPublicKeyInfo")])],
            ),
        ),
        Statement::assign(SAN_EMAIL_ADDRESSES, cert().field("EmailAddresses")),
        Statement::assign(SAN_DNS_NAMES, cert().field("DNSNames")),
        Statement::assign(SAN_IP_ADDRESSES, cert().field("IPAddresses")),
        Statement::assign(SAN_URIS, cert().field("URIs")),
    ]
    .into()
}
