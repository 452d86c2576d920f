//! Expressions and bindings: opaque text the core never interprets
//!
//! The engine treats every expression as an uninterpreted string handed
//! to the pluggable evaluator. The core only guarantees *when* an
//! expression is evaluated (bindings in declaration order, guards at the
//! moment of being tested) and *where* its result lands.

use serde::{Deserialize, Serialize};

/// The runtime representation of a variable value.
pub type Value = serde_json::Value;

/// An opaque expression, interpreted by the evaluator collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression(pub String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// The declared type of a variable. `Any` means unset: the value passes
/// through without conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VarType {
    #[default]
    Any,
    Boolean,
    Number,
    Text,
    Object,
    List,
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VarType::Any => "any",
            VarType::Boolean => "boolean",
            VarType::Number => "number",
            VarType::Text => "text",
            VarType::Object => "object",
            VarType::List => "list",
        };
        write!(f, "{name}")
    }
}

/// A named binding: maps an expression result into or out of an
/// activity's local scope. Bindings are kept in declaration order and
/// evaluated in that order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Binding {
    /// The variable the result is written to.
    pub variable: String,
    /// The expression producing the value.
    pub expression: Expression,
}

impl Binding {
    pub fn new(variable: impl Into<String>, expression: impl Into<Expression>) -> Self {
        Self {
            variable: variable.into(),
            expression: expression.into(),
        }
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_display() {
        let expr = Expression::new("amount");
        assert_eq!(expr.as_str(), "amount");
        assert_eq!(format!("{expr}"), "amount");
    }

    #[test]
    fn test_binding() {
        let b = Binding::new("total", "amount");
        assert_eq!(b.variable, "total");
        assert_eq!(b.expression, Expression::new("amount"));
    }

    #[test]
    fn test_var_type_default_is_unset() {
        assert_eq!(VarType::default(), VarType::Any);
        assert_eq!(format!("{}", VarType::Boolean), "boolean");
    }
}
