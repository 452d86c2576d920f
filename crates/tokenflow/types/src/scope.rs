//! Scopes: nested namespaces of variable declarations
//!
//! A scope is purely structural — it owns nothing at runtime. The static
//! tree is shallow: the workflow root scope encloses one scope per
//! activity. Name lookup walks outward through that chain; the nearest
//! declaration wins, so an activity-level declaration shadows a root
//! variable of the same name without ever leaking upward.

use crate::VarType;
use serde::{Deserialize, Serialize};

/// A variable declaration: a name and its declared type (or `Any` when
/// the type is left unset).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub var_type: VarType,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
        }
    }
}

/// A namespace of variable declarations, in declaration order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scope {
    /// Declared variables. Order is preserved because binding evaluation
    /// order follows declaration order.
    pub variables: Vec<VariableDecl>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable in this scope. Re-declaring a name replaces
    /// its type in place, keeping the original position.
    pub fn declare(&mut self, name: impl Into<String>, var_type: VarType) {
        let name = name.into();
        if let Some(existing) = self.variables.iter_mut().find(|v| v.name == name) {
            existing.var_type = var_type;
        } else {
            self.variables.push(VariableDecl::new(name, var_type));
        }
    }

    /// Whether this scope declares `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// The declaration for `name`, if present.
    pub fn declaration(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The declared type for `name`, `Any` when undeclared or unset.
    pub fn declared_type(&self, name: &str) -> VarType {
        self.declaration(name).map(|v| v.var_type).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup() {
        let mut scope = Scope::new();
        assert!(scope.is_empty());

        scope.declare("amount", VarType::Number);
        scope.declare("note", VarType::Any);

        assert!(scope.declares("amount"));
        assert!(!scope.declares("missing"));
        assert_eq!(scope.declared_type("amount"), VarType::Number);
        assert_eq!(scope.declared_type("note"), VarType::Any);
        assert_eq!(scope.declared_type("missing"), VarType::Any);
    }

    #[test]
    fn test_declaration_order_preserved() {
        let mut scope = Scope::new();
        scope.declare("b", VarType::Any);
        scope.declare("a", VarType::Any);
        scope.declare("c", VarType::Any);

        let names: Vec<&str> = scope.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_redeclare_keeps_position() {
        let mut scope = Scope::new();
        scope.declare("a", VarType::Any);
        scope.declare("b", VarType::Any);
        scope.declare("a", VarType::Text);

        assert_eq!(scope.variables.len(), 2);
        assert_eq!(scope.variables[0].name, "a");
        assert_eq!(scope.declared_type("a"), VarType::Text);
    }
}
