//! Policy criteria.
//!
//! A criterion turns one configuration value into a rule the policy engine
//! evaluates per request. The only family implemented here matches on the
//! caller's TLS client certificate:
//!
//! ```yaml
//! client_certificate:
//!   fingerprint:
//!     - 2c1b6aaf3bb9d1e1d1b2ac7a4c7b4c0b5d1f9b8a7e6d5c4b3a29180706050403
//!   spki_hash: FsDbM0rUYIiL3V339eIKqiz6HPSB+Pz2WeAWhqlqh8U=
//!   dns: [api.example.com, worker.example.com]
//!   uri: spiffe://cluster/ns/default/sa/foo
//! ```
//!
//! # Modules
//!
//! - [`canonical`]: per-condition validation and normalization
//! - [`facts`]: names and derivation of the certificate facts
//! - [`client_certificate`]: the `client_certificate` criterion
//! - [`registry`]: name → factory table

pub mod canonical;
pub mod client_certificate;
pub mod facts;
mod mailbox;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::rego::{Body, ElseClause, Rule, Statement, Term};
use crate::value::Value;

pub use client_certificate::ClientCertificate;
pub use registry::{Registration, Registry, RegistryBuilder};

// ─────────────────────────────────────────────────────────────────────────────
// Criterion
// ─────────────────────────────────────────────────────────────────────────────

/// Shape of configuration a criterion accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionDataType {
    /// An object of certificate conditions.
    CertificateMatcher,
}

impl CriterionDataType {
    /// Stable identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CertificateMatcher => "certificate_matcher",
        }
    }
}

impl fmt::Display for CriterionDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic reason attached to a compiled rule's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reason {
    /// The client certificate satisfied every condition.
    #[serde(rename = "client-certificate-ok")]
    ClientCertificateOk,
    /// The client certificate was missing or failed a condition.
    #[serde(rename = "client-certificate-unauthorized")]
    ClientCertificateUnauthorized,
}

impl Reason {
    /// Wire identifier reported by the engine.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientCertificateOk => "client-certificate-ok",
            Self::ClientCertificateUnauthorized => "client-certificate-unauthorized",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`Criterion::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledCriterion {
    /// The rule deciding this criterion.
    pub rule: Rule,
    /// Helper rules the primary rule depends on.
    pub additional_rules: Vec<Rule>,
}

/// A named policy condition family.
pub trait Criterion: Send + Sync {
    /// Registry name, e.g. `client_certificate`.
    fn name(&self) -> &'static str;

    /// Configuration shape this criterion accepts.
    fn data_type(&self) -> CriterionDataType;

    /// Compile one configured instance.
    ///
    /// `label` identifies the instance in logs. Compilation is pure: the same
    /// value always yields the same rule, and a failure yields no rule at all.
    fn compile(&self, label: &str, data: &Value) -> Result<CompiledCriterion, CompileError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiler context
// ─────────────────────────────────────────────────────────────────────────────

/// Context shared by every criterion instantiated from one registry.
///
/// Read-only after construction, so one `Arc<Generator>` can back any number
/// of concurrent compiles.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    rule_prefix: String,
}

impl Generator {
    /// Build a context from compiler settings.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            rule_prefix: config.rule_prefix.clone(),
        }
    }

    /// Convenience for `Arc::new(Generator::new(config))`.
    #[must_use]
    pub fn shared(config: &CompilerConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Name of the rule generated for criterion `name`.
    #[must_use]
    pub fn rule_name(&self, name: &str) -> String {
        format!("{}{name}", self.rule_prefix)
    }
}

/// `[allowed, {reason}]`
#[must_use]
pub fn criterion_term(allowed: bool, reason: Reason) -> Term {
    Term::Array(vec![
        Term::Bool(allowed),
        Term::Set(vec![Term::string(reason.as_str())]),
    ])
}

/// Wrap `body` into a rule that yields `[true, {pass}]` when it holds and
/// `[false, {fail}]` otherwise.
#[must_use]
pub fn new_criterion_rule(
    generator: &Generator,
    name: &str,
    pass: Reason,
    fail: Reason,
    body: Body,
) -> Rule {
    Rule {
        name: generator.rule_name(name),
        value: criterion_term(true, pass),
        body,
        otherwise: Some(ElseClause {
            value: criterion_term(false, fail),
            body: vec![Statement::Term {
                term: Term::Bool(true),
            }]
            .into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_rule_carries_pass_and_fail_reasons() {
        let rule = new_criterion_rule(
            &Generator::default(),
            "client_certificate",
            Reason::ClientCertificateOk,
            Reason::ClientCertificateUnauthorized,
            Body::default(),
        );
        assert_eq!(
            rule.to_string(),
            "client_certificate = [true, {\"client-certificate-ok\"}] {\n} \
             else = [false, {\"client-certificate-unauthorized\"}] {\n\ttrue\n}"
        );
    }

    #[test]
    fn rule_prefix_is_prepended() {
        let generator = Generator::new(&CompilerConfig {
            rule_prefix: "tenant_a_".to_owned(),
            ..CompilerConfig::default()
        });
        assert_eq!(
            generator.rule_name("client_certificate"),
            "tenant_a_client_certificate"
        );
    }

    #[test]
    fn reasons_serialize_to_wire_identifiers() {
        let json = serde_json::to_string(&[
            Reason::ClientCertificateOk,
            Reason::ClientCertificateUnauthorized,
        ])
        .unwrap();
        assert_eq!(
            json,
            r#"["client-certificate-ok","client-certificate-unauthorized"]"#
        );
    }
}
