//! Statements and rule bodies.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use super::term::{Term, Var};

/// One conjunct of a rule body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// `var := value`
    Assign {
        /// Variable being bound
        var: Var,
        /// Bound value
        value: Term,
    },
    /// `lhs == rhs`
    Equal {
        /// Left operand
        lhs: Term,
        /// Right operand
        rhs: Term,
    },
    /// `some a, b`: declares local iteration variables.
    SomeDecl {
        /// Declared variables
        vars: Vec<Var>,
    },
    /// A bare term that must evaluate to true.
    Term {
        /// The asserted term
        term: Term,
    },
}

impl Statement {
    /// `var := value`
    pub fn assign(var: impl Into<String>, value: Term) -> Self {
        Self::Assign {
            var: Var::new(var),
            value,
        }
    }

    /// `lhs == rhs`
    #[must_use]
    pub fn equal(lhs: Term, rhs: Term) -> Self {
        Self::Equal { lhs, rhs }
    }

    /// `some var`
    pub fn some(var: impl Into<String>) -> Self {
        Self::SomeDecl {
            vars: vec![Var::new(var)],
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign { var, value } => write!(f, "{var} := {value}"),
            Self::Equal { lhs, rhs } => write!(f, "{lhs} == {rhs}"),
            Self::SomeDecl { vars } => {
                f.write_str("some ")?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(v, f)?;
                }
                Ok(())
            }
            Self::Term { term } => fmt::Display::fmt(term, f),
        }
    }
}

/// An ordered conjunction of statements.
///
/// Bodies are assembled from independently built fragments; nothing hands a
/// `&mut Body` across module boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Body(Vec<Statement>);

impl Body {
    /// Borrow the statements.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.0
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when the body has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variables read before anything binds them, in first-use order.
    ///
    /// `globals` names roots supplied by the engine (e.g. `input`). `_` is
    /// always allowed. A variable counts as bound once an earlier statement
    /// assigns it or declares it with `some`.
    #[must_use]
    pub fn unbound_vars(&self, globals: &[&str]) -> Vec<Var> {
        let mut bound: HashSet<&str> = globals.iter().copied().collect();
        let mut unbound: Vec<Var> = Vec::new();

        for statement in &self.0 {
            match statement {
                Statement::Assign { var, value } => {
                    check(value, &bound, &mut unbound);
                    bound.insert(var.as_str());
                }
                Statement::Equal { lhs, rhs } => {
                    check(lhs, &bound, &mut unbound);
                    check(rhs, &bound, &mut unbound);
                }
                Statement::SomeDecl { vars } => {
                    bound.extend(vars.iter().map(Var::as_str));
                }
                Statement::Term { term } => check(term, &bound, &mut unbound),
            }
        }
        unbound
    }
}

fn check(term: &Term, bound: &HashSet<&str>, unbound: &mut Vec<Var>) {
    term.walk_vars(&mut |v: &Var| {
        if !v.is_wildcard() && !bound.contains(v.as_str()) && !unbound.contains(v) {
            unbound.push(v.clone());
        }
    });
}

impl From<Vec<Statement>> for Body {
    fn from(statements: Vec<Statement>) -> Self {
        Self(statements)
    }
}

impl FromIterator<Statement> for Body {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Body {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Body {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
