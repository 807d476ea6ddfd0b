//! Rhai expression engine
//!
//! Expressions are evaluated with `Engine::eval_expression`, so statements,
//! loops and function definitions are rejected outright. The engine keeps
//! the usual operator set and adds common math functions on floats.

use crate::error::{GraphError, Result, ResultExt};
use rhai::{Dynamic, Engine, Scope};

/// Opening delimiter of a channel placeholder
pub const PLACEHOLDER_OPEN: &str = "$(";

/// Sandboxed evaluator for substituted expressions
pub struct ExpressionEngine {
    engine: Engine,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

    /// Configure safety limits and math functions
    fn configure_engine(engine: &mut Engine) {
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        engine.register_fn("abs", |x: f64| x.abs());
        engine.register_fn("sqrt", |x: f64| x.sqrt());
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn("exp", |x: f64| x.exp());
        engine.register_fn("ln", |x: f64| x.ln());
        engine.register_fn("log10", |x: f64| x.log10());
        engine.register_fn("floor", |x: f64| x.floor());
        engine.register_fn("ceil", |x: f64| x.ceil());
        engine.register_fn("round", |x: f64| x.round());
        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("min", |a: f64, b: f64| a.min(b));
        engine.register_fn("max", |a: f64, b: f64| a.max(b));
    }

    /// Evaluate a fully substituted expression
    pub fn evaluate(&self, expression: &str) -> Result<Dynamic> {
        self.evaluate_with(expression, &mut Scope::new())
    }

    /// Evaluate an expression whose variables are bound in `scope`
    pub fn evaluate_with(&self, expression: &str, scope: &mut Scope) -> Result<Dynamic> {
        if expression.contains(PLACEHOLDER_OPEN) {
            return Err(GraphError::Expression(format!(
                "Unresolved placeholder in '{}'",
                expression
            )));
        }
        self.engine
            .eval_expression_with_scope::<Dynamic>(scope, expression)
            .map_err(GraphError::from_rhai_error)
            .with_context(|| format!("Evaluating '{}'", expression))
    }

    /// Evaluate to a number
    pub fn evaluate_number(&self, expression: &str) -> Result<f64> {
        let value = self.evaluate(expression)?;
        if let Ok(f) = value.as_float() {
            Ok(f)
        } else if let Ok(i) = value.as_int() {
            Ok(i as f64)
        } else {
            Err(GraphError::Expression(format!(
                "'{}' is not numeric (got {})",
                expression,
                value.type_name()
            )))
        }
    }

    /// Evaluate to a truth value; numbers are true when nonzero
    pub fn evaluate_bool(&self, expression: &str) -> Result<bool> {
        self.evaluate_bool_with(expression, &mut Scope::new())
    }

    pub fn evaluate_bool_with(&self, expression: &str, scope: &mut Scope) -> Result<bool> {
        let value = self.evaluate_with(expression, scope)?;
        if let Ok(b) = value.as_bool() {
            Ok(b)
        } else if let Ok(i) = value.as_int() {
            Ok(i != 0)
        } else if let Ok(f) = value.as_float() {
            Ok(f != 0.0)
        } else {
            Err(GraphError::Expression(format!(
                "'{}' is neither boolean nor numeric (got {})",
                expression,
                value.type_name()
            )))
        }
    }

    /// Evaluate and render the result as text
    pub fn evaluate_to_string(&self, expression: &str) -> Result<String> {
        self.evaluate_to_string_with(expression, &mut Scope::new())
    }

    pub fn evaluate_to_string_with(&self, expression: &str, scope: &mut Scope) -> Result<String> {
        let value = self.evaluate_with(expression, scope)?;
        if let Ok(f) = value.as_float() {
            Ok(f.to_string())
        } else {
            Ok(value.to_string())
        }
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let engine = ExpressionEngine::new();
        assert_eq!(engine.evaluate_number("8/2 * 10 + 3").unwrap(), 43.0);
        assert_eq!(engine.evaluate_number("0.5 * 4").unwrap(), 2.0);
        assert_eq!(engine.evaluate_number("sqrt(16.0)").unwrap(), 4.0);
    }

    #[test]
    fn test_comparisons() {
        let engine = ExpressionEngine::new();
        assert!(engine.evaluate_bool("0.3 > 0.1").unwrap());
        assert!(!engine.evaluate_bool("0.3 < 0.1").unwrap());
        assert!(engine.evaluate_bool("0.3 > 0.1 && 2 == 2").unwrap());
        assert!(engine.evaluate_bool("5").unwrap());
        assert!(!engine.evaluate_bool("0.0").unwrap());
    }

    #[test]
    fn test_unresolved_placeholder() {
        let engine = ExpressionEngine::new();
        let err = engine.evaluate("$(IBC0L02Current) > 0.1").unwrap_err();
        assert!(err.is_expression());
    }

    #[test]
    fn test_syntax_error() {
        let engine = ExpressionEngine::new();
        assert!(engine.evaluate("<undefined> > 0.1").unwrap_err().is_expression());
        assert!(engine.evaluate("3 +").unwrap_err().is_expression());
    }

    #[test]
    fn test_statements_rejected() {
        let engine = ExpressionEngine::new();
        assert!(engine.evaluate("let x = 1; x").is_err());
        assert!(engine.evaluate("loop { }").is_err());
    }

    #[test]
    fn test_scope_variables_are_floats() {
        let engine = ExpressionEngine::new();
        let mut scope = Scope::new();
        scope.push("x", 3.0_f64);
        assert_eq!(engine.evaluate_to_string_with("x / 2", &mut scope).unwrap(), "1.5");
        assert!(engine.evaluate_bool_with("-x < 0", &mut scope).unwrap());
    }

    #[test]
    fn test_render() {
        let engine = ExpressionEngine::new();
        assert_eq!(engine.evaluate_to_string("2 * 10").unwrap(), "20");
        assert_eq!(engine.evaluate_to_string("2.5 * 2.0").unwrap(), "5");
        assert_eq!(engine.evaluate_to_string("1.5 + 1.0").unwrap(), "2.5");
    }
}
