//! Evaluation-engine IR.
//!
//! Compiled criteria are expressed as rules in the policy engine's own
//! statement language: variable assignments, equality constraints (with `_`
//! standing for "some element of this collection") and `some` declarations.
//! This module only builds and renders that IR; evaluating it is the
//! engine's job.
//!
//! ```text
//! client_certificate = [true, {"client-certificate-ok"}] {
//!     cert := crypto.x509.parse_certificates(trim_space(input.http.client_certificate.leaf))[0]
//!     ...
//!     allowed_san_dns_names := ["a.example.com"]
//!     allowed_san_dns_names[_] == san_dns_names[_]
//! } else = [false, {"client-certificate-unauthorized"}] {
//!     true
//! }
//! ```

pub mod body;
pub mod rule;
pub mod term;

pub use body::{Body, Statement};
pub use rule::{ElseClause, Rule};
pub use term::{Call, Ref, RefSegment, Term, Var, WILDCARD};
