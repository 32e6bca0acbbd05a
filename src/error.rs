//! Error types for certmatch

use std::io;

use thiserror::Error;

use crate::value::ValueKind;

/// Result type alias for certmatch
pub type Result<T> = std::result::Result<T, Error>;

/// certmatch errors
#[derive(Error, Debug)]
pub enum Error {
    /// A criterion failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Two factories registered under one criterion name
    #[error("criterion `{name}` is already registered")]
    RegistrationConflict {
        /// Criterion name
        name: String,
    },

    /// No criterion registered under this name
    #[error("unknown criterion: {0}")]
    UnknownCriterion(String),

    /// Certificate bytes could not be parsed
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Compile errors
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse classification of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong structural type, or an empty required string.
    Shape,
    /// Right shape, but the value fails the condition's grammar.
    Format,
    /// The object contains a key with no condition builder.
    UnknownKey,
    /// The compiler produced an ill-formed rule.
    Internal,
}

/// A criterion could not be compiled into a rule.
///
/// Every variant names the criterion; condition and raw value are included
/// whenever the failure can be pinned to them. The `Display` text is meant
/// to be surfaced to operators verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The value (or one element of it) has the wrong structural type.
    #[error("{criterion}{}: expected {expected}, got {found}", location(.condition, .element))]
    Shape {
        /// Criterion name
        criterion: &'static str,
        /// Condition key, when the value belongs to one
        condition: Option<&'static str>,
        /// Sequence index of the offending element
        element: Option<usize>,
        /// Description of the accepted shape
        expected: &'static str,
        /// Shape that was found instead
        found: ValueKind,
    },

    /// A required string was empty.
    #[error("{criterion}.{condition}{}: {subject} must not be empty", index(.element))]
    Empty {
        /// Criterion name
        criterion: &'static str,
        /// Condition key
        condition: &'static str,
        /// Sequence index of the offending element
        element: Option<usize>,
        /// What the value describes, e.g. "certificate fingerprint"
        subject: &'static str,
    },

    /// A string failed the condition's grammar.
    #[error("{criterion}.{condition}{}: {subject} must be {expected} (was {value})", index(.element))]
    Format {
        /// Criterion name
        criterion: &'static str,
        /// Condition key
        condition: &'static str,
        /// Sequence index of the offending element
        element: Option<usize>,
        /// What the value describes, e.g. "certificate SAN email"
        subject: &'static str,
        /// Description of the accepted format
        expected: &'static str,
        /// The raw configured value
        value: String,
    },

    /// The object contains an unsupported condition key.
    #[error("{criterion}: unsupported certificate matcher condition: {key}")]
    UnknownKey {
        /// Criterion name
        criterion: &'static str,
        /// Offending key
        key: String,
    },

    /// A generated statement references a variable nothing binds.
    #[error("{criterion}: generated rule references unbound variable `{var}`")]
    UnboundVariable {
        /// Criterion name
        criterion: &'static str,
        /// Unbound variable name
        var: String,
    },
}

impl CompileError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Shape { .. } | Self::Empty { .. } => ErrorKind::Shape,
            Self::Format { .. } => ErrorKind::Format,
            Self::UnknownKey { .. } => ErrorKind::UnknownKey,
            Self::UnboundVariable { .. } => ErrorKind::Internal,
        }
    }

    /// Criterion that failed to compile.
    #[must_use]
    pub fn criterion(&self) -> &'static str {
        match self {
            Self::Shape { criterion, .. }
            | Self::Empty { criterion, .. }
            | Self::Format { criterion, .. }
            | Self::UnknownKey { criterion, .. }
            | Self::UnboundVariable { criterion, .. } => criterion,
        }
    }

    /// Condition key the failure belongs to, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        match self {
            Self::Shape { condition, .. } => *condition,
            Self::Empty { condition, .. } | Self::Format { condition, .. } => Some(condition),
            Self::UnknownKey { key, .. } => Some(key),
            Self::UnboundVariable { .. } => None,
        }
    }

    /// Offending raw value, if the failure can be pinned to one.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Format { value, .. } => Some(value),
            Self::Empty { .. } => Some(""),
            _ => None,
        }
    }
}

fn location(condition: &Option<&str>, element: &Option<usize>) -> String {
    match condition {
        Some(c) => format!(".{c}{}", index(element)),
        None => String::new(),
    }
}

fn index(element: &Option<usize>) -> String {
    element.map(|i| format!("[{i}]")).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Canonicalizer errors
// ─────────────────────────────────────────────────────────────────────────────

/// A single configured string was rejected by its canonicalizer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty input.
    #[error("must not be empty")]
    Empty,
    /// Input does not match the expected grammar.
    #[error("must be {expected}")]
    Malformed {
        /// Description of the accepted format
        expected: &'static str,
    },
}
