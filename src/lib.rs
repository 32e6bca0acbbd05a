//! certmatch
//!
//! Compiles declarative client-certificate allow-lists into rules for a
//! Rego-style policy engine.
//!
//! # Features
//!
//! - **Six conditions**: fingerprint, SPKI hash, SAN email, DNS, IP and URI
//! - **Strict loading**: every configured value is validated and canonicalized
//!   before a rule exists; one bad entry rejects the whole criterion
//! - **Pluggable criteria**: name → factory [`criteria::Registry`]
//! - **Inspection**: derive the facts a rule sees from a PEM or DER certificate
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use certmatch::criteria::{Generator, Registry};
//! use certmatch::value::Value;
//!
//! let policy = Value::from_yaml_str("dns: api.example.com").unwrap();
//! let compiled = Registry::builtin()
//!     .compile("client_certificate", &Arc::new(Generator::default()), "api", &policy)
//!     .unwrap();
//! assert!(compiled.rule.to_string().contains("allowed_san_dns_names[_] == san_dns_names[_]"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod criteria;
pub mod error;
pub mod inspect;
pub mod rego;
pub mod uri;
pub mod value;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// Logs go to stderr so that compiled rules on stdout stay pipeable.
///
/// # Errors
///
/// Returns `Error::Config` if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
