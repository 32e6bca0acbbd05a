//! The `client_certificate` criterion.
//!
//! Compiles an object of certificate conditions into one rule: the fact
//! prologue followed, for each configured condition, by an allow-list
//! binding and a constraint tying it to the matching certificate fact.
//!
//! | Key | Allow-list | Constraint |
//! |-----|------------|------------|
//! | `fingerprint` | `allowed_fingerprints` | `fingerprint == allowed_fingerprints[_]` |
//! | `spki_hash` | `allowed_spki_hashes` | `spki_hash == allowed_spki_hashes[_]` |
//! | `email` | `allowed_san_emails` | `allowed_san_emails[_] == san_email_addresses[_]` |
//! | `dns` | `allowed_san_dns_names` | `allowed_san_dns_names[_] == san_dns_names[_]` |
//! | `ip` | `allowed_san_ip_addresses` | `allowed_san_ip_addresses[_] == san_ip_addresses[_]` |
//! | `uri` | `allowed_san_uris` | see below |
//!
//! # SAN URI matching
//!
//! Each certificate URI is rebuilt as `scheme://host` + path and compared to
//! the configured strings exactly as written. The certificate's query and
//! fragment are dropped, the configured value is not normalized, so:
//!
//! - `spiffe://cluster/ns/default/sa/foo?x=1#frag` in a certificate matches a
//!   configured `spiffe://cluster/ns/default/sa/foo`;
//! - a configured value with a query, fragment or extra trailing slash never
//!   matches a certificate URI without one.
//!
//! Conditions are conjunctive: every configured key must match.

use std::sync::Arc;

use tracing::{debug, warn};

use super::canonical;
use super::facts;
use super::{
    CompiledCriterion, Criterion, CriterionDataType, Generator, Reason, Registration,
    new_criterion_rule,
};
use crate::error::{CompileError, ValidationError};
use crate::rego::{Body, Statement, Term};
use crate::value::Value;

/// Registry name of this criterion.
pub const NAME: &str = "client_certificate";

/// Index variable declared by the SAN URI constraint.
const SAN_URI_INDEX: &str = "san_uri_index";

/// Registry entry for [`ClientCertificate`].
pub const REGISTRATION: Registration = Registration {
    name: NAME,
    data_type: CriterionDataType::CertificateMatcher,
    factory: ClientCertificate::boxed,
};

// ─────────────────────────────────────────────────────────────────────────────
// Conditions
// ─────────────────────────────────────────────────────────────────────────────

/// How an allow-list is tied to its certificate fact.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// Scalar fact equals some allow-list entry.
    Equal(&'static str),
    /// Some allow-list entry equals some element of a fact sequence.
    AnyOf(&'static str),
    /// Some reconstructed SAN URI equals some allow-list entry.
    SanUri,
}

/// One supported condition key.
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    /// Configuration key.
    pub key: &'static str,
    /// Human description used in error messages.
    pub subject: &'static str,
    /// Variable the canonicalized allow-list is bound to.
    pub allow_list: &'static str,
    canonicalize: fn(&str) -> Result<String, ValidationError>,
    matcher: Matcher,
}

/// Supported condition keys, in documentation order.
pub const CONDITIONS: &[Condition] = &[
    Condition {
        key: "fingerprint",
        subject: "certificate fingerprint",
        allow_list: "allowed_fingerprints",
        canonicalize: canonical::fingerprint,
        matcher: Matcher::Equal(facts::FINGERPRINT),
    },
    Condition {
        key: "spki_hash",
        subject: "certificate SPKI hash",
        allow_list: "allowed_spki_hashes",
        canonicalize: canonical::spki_hash,
        matcher: Matcher::Equal(facts::SPKI_HASH),
    },
    Condition {
        key: "email",
        subject: "certificate SAN email",
        allow_list: "allowed_san_emails",
        canonicalize: canonical::san_email,
        matcher: Matcher::AnyOf(facts::SAN_EMAIL_ADDRESSES),
    },
    Condition {
        key: "dns",
        subject: "certificate SAN dns",
        allow_list: "allowed_san_dns_names",
        canonicalize: canonical::san_dns,
        matcher: Matcher::AnyOf(facts::SAN_DNS_NAMES),
    },
    Condition {
        key: "ip",
        subject: "certificate SAN IP",
        allow_list: "allowed_san_ip_addresses",
        canonicalize: canonical::san_ip,
        matcher: Matcher::AnyOf(facts::SAN_IP_ADDRESSES),
    },
    Condition {
        key: "uri",
        subject: "certificate SAN URI",
        allow_list: "allowed_san_uris",
        canonicalize: canonical::san_uri,
        matcher: Matcher::SanUri,
    },
];

/// Look up the condition for a configuration key.
#[must_use]
pub fn condition(key: &str) -> Option<&'static Condition> {
    CONDITIONS.iter().find(|c| c.key == key)
}

impl Condition {
    /// Compile this condition's value into an allow-list binding and its
    /// constraint.
    ///
    /// A bare string is treated as a one-element sequence. Elements are
    /// canonicalized in order and the first failure aborts the condition.
    pub fn build(&self, value: &Value) -> Result<Vec<Statement>, CompileError> {
        let raw = self.coerce(value)?;
        // Bare strings were coerced to one element; only arrays get an index.
        let indexed = matches!(value, Value::Array(_));
        let allowed = raw
            .iter()
            .enumerate()
            .map(|(i, s)| self.canonical(s, indexed.then_some(i)))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(condition = self.key, entries = allowed.len(), "compiled condition");
        if allowed.is_empty() {
            warn!(
                condition = self.key,
                "empty allow-list: no certificate can satisfy this condition"
            );
        }

        let mut statements = vec![Statement::assign(
            self.allow_list,
            Term::string_array(allowed),
        )];
        statements.extend(self.constraint());
        Ok(statements)
    }

    fn coerce<'v>(&self, value: &'v Value) -> Result<Vec<&'v str>, CompileError> {
        match value {
            Value::String(s) => Ok(vec![s.as_str()]),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_str().ok_or(CompileError::Shape {
                        criterion: NAME,
                        condition: Some(self.key),
                        element: Some(i),
                        expected: "a string",
                        found: item.kind(),
                    })
                })
                .collect(),
            other => Err(CompileError::Shape {
                criterion: NAME,
                condition: Some(self.key),
                element: None,
                expected: "a string or array of strings",
                found: other.kind(),
            }),
        }
    }

    fn canonical(&self, raw: &str, element: Option<usize>) -> Result<String, CompileError> {
        (self.canonicalize)(raw).map_err(|e| match e {
            ValidationError::Empty => CompileError::Empty {
                criterion: NAME,
                condition: self.key,
                element,
                subject: self.subject,
            },
            ValidationError::Malformed { expected } => CompileError::Format {
                criterion: NAME,
                condition: self.key,
                element,
                subject: self.subject,
                expected,
                value: raw.to_owned(),
            },
        })
    }

    fn constraint(&self) -> Vec<Statement> {
        let allowed = Term::var(self.allow_list);
        match self.matcher {
            Matcher::Equal(fact) => vec![Statement::equal(Term::var(fact), allowed.any())],
            Matcher::AnyOf(fact) => vec![Statement::equal(allowed.any(), Term::var(fact).any())],
            Matcher::SanUri => {
                let uri = || Term::var(facts::SAN_URIS).index(Term::var(SAN_URI_INDEX));
                vec![
                    Statement::some(SAN_URI_INDEX),
                    Statement::equal(
                        Term::call(
                            "sprintf",
                            [
                                Term::string("%s://%s%s"),
                                Term::Array(vec![
                                    uri().field("Scheme"),
                                    uri().field("Host"),
                                    uri().field("Path"),
                                ]),
                            ],
                        ),
                        allowed.any(),
                    ),
                ]
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Criterion
// ─────────────────────────────────────────────────────────────────────────────

/// Matches the caller's TLS client certificate.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    generator: Arc<Generator>,
}

impl ClientCertificate {
    /// Bind the criterion to a compiler context.
    #[must_use]
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }

    fn boxed(generator: Arc<Generator>) -> Box<dyn Criterion> {
        Box::new(Self::new(generator))
    }
}

impl Criterion for ClientCertificate {
    fn name(&self) -> &'static str {
        NAME
    }

    fn data_type(&self) -> CriterionDataType {
        CriterionDataType::CertificateMatcher
    }

    fn compile(&self, label: &str, data: &Value) -> Result<CompiledCriterion, CompileError> {
        let _span = tracing::debug_span!("compile", criterion = NAME, label).entered();

        compile_body(data)
            .map(|body| CompiledCriterion {
                rule: new_criterion_rule(
                    &self.generator,
                    NAME,
                    Reason::ClientCertificateOk,
                    Reason::ClientCertificateUnauthorized,
                    body,
                ),
                additional_rules: Vec::new(),
            })
            .inspect_err(|e| {
                warn!(
                    criterion = e.criterion(),
                    condition = e.condition(),
                    value = e.value(),
                    "rejected criterion: {e}"
                );
            })
    }
}

fn compile_body(data: &Value) -> Result<Body, CompileError> {
    let Value::Object(obj) = data else {
        return Err(CompileError::Shape {
            criterion: NAME,
            condition: None,
            element: None,
            expected: "an object of certificate conditions",
            found: data.kind(),
        });
    };

    let fragments = obj
        .iter()
        .map(|(key, value)| {
            condition(key)
                .ok_or_else(|| CompileError::UnknownKey {
                    criterion: NAME,
                    key: key.to_owned(),
                })?
                .build(value)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let body: Body = facts::prologue()
        .into_iter()
        .chain(fragments.into_iter().flatten())
        .collect();

    if let Some(var) = body.unbound_vars(facts::GLOBALS).into_iter().next() {
        return Err(CompileError::UnboundVariable {
            criterion: NAME,
            var: var.to_string(),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::{Object, ValueKind};
    use pretty_assertions::assert_eq;

    fn criterion() -> ClientCertificate {
        ClientCertificate::new(Arc::new(Generator::default()))
    }

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(entries.iter().cloned().collect::<Object>())
    }

    fn condition_lines(value: &Value) -> Vec<String> {
        let compiled = criterion().compile("test", value).unwrap();
        let prologue_len = facts::prologue().len();
        compiled.rule.body.statements()[prologue_len..]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn every_condition_has_a_distinct_allow_list() {
        let mut names: Vec<&str> = CONDITIONS.iter().map(|c| c.allow_list).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CONDITIONS.len());
    }

    #[test]
    fn spki_hash_condition_uses_equality() {
        let hash = "FsDbM0rUYIiL3V339eIKqiz6HPSB+Pz2WeAWhqlqh8U=";
        assert_eq!(
            condition_lines(&object(&[("spki_hash", hash.into())])),
            [
                format!("allowed_spki_hashes := [\"{hash}\"]"),
                "spki_hash == allowed_spki_hashes[_]".to_owned(),
            ]
        );
    }

    #[test]
    fn san_conditions_use_membership() {
        let lines = condition_lines(&object(&[
            ("email", "a@example.com".into()),
            ("dns", vec!["a.example.com", "b.example.com"].into()),
            ("ip", "10.0.0.1".into()),
        ]));
        assert_eq!(
            lines,
            [
                r#"allowed_san_emails := ["a@example.com"]"#,
                "allowed_san_emails[_] == san_email_addresses[_]",
                r#"allowed_san_dns_names := ["a.example.com", "b.example.com"]"#,
                "allowed_san_dns_names[_] == san_dns_names[_]",
                r#"allowed_san_ip_addresses := ["10.0.0.1"]"#,
                "allowed_san_ip_addresses[_] == san_ip_addresses[_]",
            ]
        );
    }

    #[test]
    fn uri_condition_compares_reconstructed_certificate_uri() {
        let lines = condition_lines(&object(&[(
            "uri",
            "spiffe://cluster/ns/default/sa/foo".into(),
        )]));
        assert_eq!(
            lines,
            [
                r#"allowed_san_uris := ["spiffe://cluster/ns/default/sa/foo"]"#,
                "some san_uri_index",
                r#"sprintf("%s://%s%s", [san_uris[san_uri_index].Scheme, san_uris[san_uri_index].Host, san_uris[san_uri_index].Path]) == allowed_san_uris[_]"#,
            ]
        );
    }

    #[test]
    fn uri_allow_list_is_kept_verbatim() {
        // GIVEN: a configured URI with a query string
        let lines = condition_lines(&object(&[("uri", "spiffe://c/p?x=1".into())]));
        // THEN: it is bound as written, even though it can never match
        assert_eq!(lines[0], r#"allowed_san_uris := ["spiffe://c/p?x=1"]"#);
    }

    #[test]
    fn non_object_value_is_a_shape_error() {
        let err = criterion().compile("test", &"abc".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.condition(), None);
    }

    #[test]
    fn non_string_condition_value_is_a_shape_error() {
        let value = object(&[("dns", Value::Bool(true))]);
        let err = criterion().compile("test", &value).unwrap_err();
        assert_eq!(
            err,
            CompileError::Shape {
                criterion: NAME,
                condition: Some("dns"),
                element: None,
                expected: "a string or array of strings",
                found: ValueKind::Bool,
            }
        );
    }

    #[test]
    fn non_string_element_is_reported_by_index() {
        let value = object(&[(
            "ip",
            Value::Array(vec!["10.0.0.1".into(), Value::Null]),
        )]);
        let err = criterion().compile("test", &value).unwrap_err();
        assert_eq!(err.to_string(), "client_certificate.ip[1]: expected a string, got null");
    }

    #[test]
    fn empty_fingerprint_is_a_shape_error() {
        let err = criterion()
            .compile("test", &object(&[("fingerprint", "".into())]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(
            err.to_string(),
            "client_certificate.fingerprint: certificate fingerprint must not be empty"
        );
    }

    #[test]
    fn first_invalid_element_aborts_the_condition() {
        // GIVEN: two invalid DNS names
        let value = object(&[("dns", vec!["ok.example.com", "-first", "-second"].into())]);
        let err = criterion().compile("test", &value).unwrap_err();
        // THEN: only the first offender is reported
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.value(), Some("-first"));
    }

    #[test]
    fn repeated_bad_value_is_told_apart_by_index() {
        // GIVEN: the same malformed IP as the second and third element
        let value = object(&[("ip", vec!["10.0.0.1", "10.0.0", "10.0.0"].into())]);
        let err = criterion().compile("test", &value).unwrap_err();
        // THEN: the first occurrence is named by position
        assert_eq!(
            err.to_string(),
            "client_certificate.ip[1]: certificate SAN IP must be a valid IP address (was 10.0.0)"
        );
    }

    #[test]
    fn unknown_key_aborts_even_after_valid_conditions() {
        let value = object(&[("dns", "a.example.com".into()), ("bogus_key", "x".into())]);
        let err = criterion().compile("test", &value).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownKey {
                criterion: NAME,
                key: "bogus_key".to_owned(),
            }
        );
    }

    #[test]
    fn empty_object_compiles_to_prologue_only() {
        let compiled = criterion().compile("test", &object(&[])).unwrap();
        assert_eq!(compiled.rule.body, facts::prologue());
        assert!(compiled.additional_rules.is_empty());
    }

    #[test]
    fn empty_array_yields_empty_allow_list() {
        let lines = condition_lines(&object(&[("ip", Value::Array(Vec::new()))]));
        assert_eq!(lines[0], "allowed_san_ip_addresses := []");
    }
}
