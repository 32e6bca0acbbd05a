//! Complete rules: a named head value guarded by a body.

use std::fmt;

use serde::Serialize;

use super::body::Body;
use super::term::Term;

/// `name = value { body } else = value { body }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Rule name.
    pub name: String,
    /// Value the rule produces when the body holds.
    pub value: Term,
    /// Guarding body.
    pub body: Body,
    /// Fallback taken when the body does not hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<ElseClause>,
}

/// The `else = value { body }` tail of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElseClause {
    /// Fallback value.
    pub value: Term,
    /// Fallback guard.
    pub body: Body,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {{", self.name, self.value)?;
        write_body(f, &self.body)?;
        f.write_str("}")?;
        if let Some(otherwise) = &self.otherwise {
            write!(f, " else = {} {{", otherwise.value)?;
            write_body(f, &otherwise.body)?;
            f.write_str("}")?;
        }
        Ok(())
    }
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &Body) -> fmt::Result {
    f.write_str("\n")?;
    for statement in body {
        writeln!(f, "\t{statement}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rego::Statement;

    #[test]
    fn rule_with_else_renders_both_branches() {
        let rule = Rule {
            name: "allow".to_owned(),
            value: Term::Bool(true),
            body: vec![Statement::equal(Term::var("input").field("x"), Term::Number(1))].into(),
            otherwise: Some(ElseClause {
                value: Term::Bool(false),
                body: vec![Statement::Term {
                    term: Term::Bool(true),
                }]
                .into(),
            }),
        };
        assert_eq!(
            rule.to_string(),
            "allow = true {\n\tinput.x == 1\n} else = false {\n\ttrue\n}"
        );
    }
}
