//! Terms: the expressions statements are built from.

use std::fmt;

use serde::Serialize;

/// The anonymous wildcard variable.
pub const WILDCARD: &str = "_";

/// A variable name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    /// Create a variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Variable name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for `_`, which never needs a binding.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// Variable reference.
    Var(Var),
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Number(i64),
    /// String literal.
    String(String),
    /// Array literal.
    Array(Vec<Term>),
    /// Set literal.
    Set(Vec<Term>),
    /// Reference into a term: `head.field[index][_]`.
    Ref(Ref),
    /// Built-in function call.
    Call(Call),
}

impl Term {
    /// Variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(Var::new(name))
    }

    /// String literal term.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Array literal of strings.
    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(items.into_iter().map(Self::string).collect())
    }

    /// Call a built-in, e.g. `Term::call("crypto.sha256", [arg])`.
    pub fn call(function: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        Self::Call(Call {
            function: function.into(),
            args: args.into_iter().collect(),
        })
    }

    /// `self.name`
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        self.push(RefSegment::Field(name.into()))
    }

    /// `self[index]`
    #[must_use]
    pub fn index(self, index: Term) -> Self {
        self.push(RefSegment::Index(index))
    }

    /// `self[_]`: some element of `self`.
    #[must_use]
    pub fn any(self) -> Self {
        self.push(RefSegment::Index(Self::var(WILDCARD)))
    }

    fn push(self, segment: RefSegment) -> Self {
        match self {
            Self::Ref(mut r) => {
                r.path.push(segment);
                Self::Ref(r)
            }
            head => Self::Ref(Ref {
                head: Box::new(head),
                path: vec![segment],
            }),
        }
    }

    /// Visit every variable this term reads, in source order.
    pub(crate) fn walk_vars<'a>(&'a self, visit: &mut impl FnMut(&'a Var)) {
        match self {
            Self::Var(v) => visit(v),
            Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
            Self::Array(items) | Self::Set(items) => {
                for item in items {
                    item.walk_vars(visit);
                }
            }
            Self::Ref(r) => {
                r.head.walk_vars(visit);
                for segment in &r.path {
                    if let RefSegment::Index(t) = segment {
                        t.walk_vars(visit);
                    }
                }
            }
            Self::Call(c) => {
                for arg in &c.args {
                    arg.walk_vars(visit);
                }
            }
        }
    }
}

/// A reference path rooted at a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ref {
    /// Root of the reference (variable or call result).
    pub head: Box<Term>,
    /// Path segments, outermost first.
    pub path: Vec<RefSegment>,
}

/// One step of a [`Ref`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RefSegment {
    /// `.name`
    Field(String),
    /// `[term]`
    Index(Term),
}

/// A built-in function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    /// Dotted built-in name, e.g. `crypto.sha256`.
    pub function: String,
    /// Positional arguments.
    pub args: Vec<Term>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => fmt::Display::fmt(v, f),
            Self::Bool(b) => fmt::Display::fmt(b, f),
            Self::Number(n) => fmt::Display::fmt(n, f),
            Self::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            Self::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Self::Set(items) => {
                f.write_str("{")?;
                write_list(f, items)?;
                f.write_str("}")
            }
            Self::Ref(r) => fmt::Display::fmt(r, f),
            Self::Call(c) => fmt::Display::fmt(c, f),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.head, f)?;
        for segment in &self.path {
            match segment {
                RefSegment::Field(name) => write!(f, ".{name}")?,
                RefSegment::Index(t) => write!(f, "[{t}]")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt::Display::fmt(item, f)?;
    }
    Ok(())
}
