//! Rhai expression engine for scripted responses
//!
//! Expressions are evaluated once per row. Every stored variable is bound in
//! the scope under its own name, so `y = x0 * 2 + noise(0.1)` reads the
//! `x0` setting of the current row.
//!
//! ## Built-in Functions
//!
//! - Math: `abs`, `sqrt`, `pow`, `exp`, `ln`, `log10`, `sin`, `cos`, `tan`,
//!   `asin`, `acos`, `atan`, `atan2`, `sinh`, `cosh`, `tanh`, `floor`,
//!   `ceil`, `round`, `clamp`, `min`, `max`
//! - Constants: `pi()`, `e()`
//! - `noise(amp)` - uniform noise in `[-amp, amp]`
//! - `sign`, `lerp`, `map_range`, `is_nan`, `is_finite`

use crate::backend::simulated::rand_simple;
use crate::error::{Result, ResultExt, SweepError};
use rhai::{Dynamic, Engine, Scope, AST};
use std::fmt;

/// A compiled response or read-back expression
#[derive(Clone)]
pub struct CompiledExpr {
    ast: AST,
    source: String,
    name: String,
}

impl CompiledExpr {
    /// Source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attribute the expression belongs to
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

/// Sandboxed Rhai engine with the measurement function set registered
pub struct ScriptEngine {
    engine: Engine,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}

impl ScriptEngine {
    /// Create an engine with safety limits and built-ins configured
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

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

        engine.register_fn("sin", |x: f64| x.sin());
        engine.register_fn("cos", |x: f64| x.cos());
        engine.register_fn("tan", |x: f64| x.tan());
        engine.register_fn("asin", |x: f64| x.asin());
        engine.register_fn("acos", |x: f64| x.acos());
        engine.register_fn("atan", |x: f64| x.atan());
        engine.register_fn("atan2", |y: f64, x: f64| y.atan2(x));
        engine.register_fn("sinh", |x: f64| x.sinh());
        engine.register_fn("cosh", |x: f64| x.cosh());
        engine.register_fn("tanh", |x: f64| x.tanh());

        engine.register_fn("floor", |x: f64| x.floor());
        engine.register_fn("ceil", |x: f64| x.ceil());
        engine.register_fn("round", |x: f64| x.round());

        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("min", |a: f64, b: f64| a.min(b));
        engine.register_fn("max", |a: f64, b: f64| a.max(b));

        engine.register_fn("pi", || std::f64::consts::PI);
        engine.register_fn("e", || std::f64::consts::E);

        // Instrument noise
        engine.register_fn("noise", |amp: f64| (rand_simple() - 0.5) * 2.0 * amp);
        engine.register_fn("noise", |amp: i64| (rand_simple() - 0.5) * 2.0 * amp as f64);

        engine.register_fn("is_nan", |x: f64| x.is_nan());
        engine.register_fn("is_finite", |x: f64| x.is_finite());
        engine.register_fn("sign", |x: f64| {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        });
        engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
    }

    /// Compile an expression for attribute `name`
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledExpr> {
        let ast = self
            .engine
            .compile_expression(source)
            .map_err(|e| SweepError::Script(format!("Compilation error in '{}': {}", name, e)))?;

        Ok(CompiledExpr {
            ast,
            source: source.to_string(),
            name: name.to_string(),
        })
    }

    /// Evaluate `expr` with `bindings` pushed into a fresh scope
    pub fn eval(&self, expr: &CompiledExpr, bindings: &[(&str, f64)]) -> Result<f64> {
        let mut scope = Scope::new();
        for (name, value) in bindings {
            scope.push(name.to_string(), *value);
        }

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &expr.ast)
            .with_context(|| format!("Evaluating '{}'", expr.name))?;

        if let Ok(f) = value.as_float() {
            Ok(f)
        } else if let Ok(i) = value.as_int() {
            Ok(i as f64)
        } else if let Ok(b) = value.as_bool() {
            Ok(if b { 1.0 } else { 0.0 })
        } else {
            Err(SweepError::Script(format!(
                "'{}' must evaluate to a number, got {}",
                expr.name,
                value.type_name()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_with_bindings() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("y", "x0 * 2.0 + x1").unwrap();
        assert_eq!(engine.eval(&expr, &[("x0", 1.5), ("x1", 1.0)]).unwrap(), 4.0);
    }

    #[test]
    fn test_integer_result_is_widened() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("k", "40 + 2").unwrap();
        assert_eq!(engine.eval(&expr, &[]).unwrap(), 42.0);
    }

    #[test]
    fn test_builtins() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("s", "sin(pi() / 2.0)").unwrap();
        assert!((engine.eval(&expr, &[]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_bounded() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("n", "noise(0.5)").unwrap();
        for _ in 0..100 {
            let v = engine.eval(&expr, &[]).unwrap();
            assert!((-0.5..=0.5).contains(&v));
        }
    }

    #[test]
    fn test_compile_error() {
        let engine = ScriptEngine::new();
        let err = engine.compile("bad", "x0 +* 2").unwrap_err();
        assert!(matches!(err, SweepError::Script(_)));
    }

    #[test]
    fn test_unknown_variable_fails_at_eval() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("y", "missing * 2.0").unwrap();
        let err = engine.eval(&expr, &[]).unwrap_err();
        assert!(err.to_string().contains("Evaluating 'y'"));
    }

    #[test]
    fn test_string_result_rejected() {
        let engine = ScriptEngine::new();
        let expr = engine.compile("t", "\"hello\"").unwrap();
        assert!(engine.eval(&expr, &[]).is_err());
    }
}
