//! A minimal reference evaluator
//!
//! The core treats expressions as opaque text; anything resembling a
//! real expression language belongs to a collaborator. This evaluator
//! is the smallest honest implementation: expression text that parses
//! as JSON is a literal, anything else is a variable reference resolved
//! through the scope chain. It is what the engine's own tests run
//! against and a reasonable default for embedders with literal-only
//! workflows.

use crate::collaborators::ExpressionEvaluator;
use tokenflow_types::{EvalError, Expression, ScopeView, Value, VarType};

/// Literal-or-variable-reference evaluation; conversions fail loudly.
pub struct SimpleEvaluator;

impl SimpleEvaluator {
    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "text",
            Value::Array(_) => "list",
            Value::Object(_) => "object",
        }
    }

    fn unsupported(value: &Value, target: &VarType) -> EvalError {
        EvalError::UnsupportedConversion {
            from: Self::type_name(value).to_string(),
            to: target.to_string(),
        }
    }
}

impl ExpressionEvaluator for SimpleEvaluator {
    fn evaluate(&self, expression: &Expression, scope: &ScopeView<'_>) -> Result<Value, EvalError> {
        let text = expression.as_str().trim();
        if text.is_empty() {
            return Err(EvalError::Evaluation("empty expression".into()));
        }
        if let Ok(literal) = serde_json::from_str::<Value>(text) {
            return Ok(literal);
        }
        scope
            .get(text)
            .cloned()
            .ok_or_else(|| EvalError::Evaluation(format!("undefined variable `{text}`")))
    }

    fn convert(&self, value: Value, target: &VarType) -> Result<Value, EvalError> {
        match target {
            VarType::Any => Ok(value),
            VarType::Boolean => match value {
                Value::Bool(_) => Ok(value),
                other => Err(Self::unsupported(&other, target)),
            },
            VarType::Number => match value {
                Value::Number(_) => Ok(value),
                other => Err(Self::unsupported(&other, target)),
            },
            VarType::Text => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                other => Err(Self::unsupported(&other, target)),
            },
            VarType::Object => match value {
                Value::Object(_) => Ok(value),
                other => Err(Self::unsupported(&other, target)),
            },
            VarType::List => match value {
                Value::Array(_) => Ok(value),
                other => Err(Self::unsupported(&other, target)),
            },
        }
    }
}
