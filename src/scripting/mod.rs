//! Scripted instruments
//!
//! A [`ScriptedInstrument`] stands in for real hardware when an experiment
//! is described entirely in a configuration file. Variables and parameters
//! are stored as they are set; each response is a Rhai expression computed
//! from the stored values, one evaluation per row of the active batch.
//!
//! # Example
//!
//! ```
//! use labsweep::backend::{Attribute, AttributeRegistry};
//! use labsweep::scripting::ScriptedInstrument;
//! use labsweep::types::AttrValue;
//!
//! let instrument = ScriptedInstrument::new();
//! let mut registry = AttributeRegistry::new();
//! instrument.register_variable(&mut registry, "x");
//! instrument.register_response(&mut registry, "y", "x * x").unwrap();
//!
//! registry.get("x").unwrap().set(&AttrValue::Vector(vec![1.0, 2.0, 3.0])).unwrap();
//! let y = registry.get("y").unwrap().get().unwrap();
//! assert_eq!(y, AttrValue::Vector(vec![1.0, 4.0, 9.0]));
//! ```
//!
//! # Binding Rules
//!
//! - Every stored scalar is visible in every row
//! - Stored vectors must share one length; that length is the row count
//! - A read-back expression also sees `value`, the value last set on it

mod engine;

pub use engine::{CompiledExpr, ScriptEngine};

use crate::backend::{Attribute, AttributeRegistry, Instrument};
use crate::error::{Result, SweepError};
use crate::types::AttrValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type SharedState = Arc<Mutex<HashMap<String, AttrValue>>>;

/// Instrument whose attributes share one value store and one script engine
#[derive(Debug, Clone, Default)]
pub struct ScriptedInstrument {
    engine: Arc<ScriptEngine>,
    state: SharedState,
}

impl ScriptedInstrument {
    /// Create an instrument with an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute that stores what it is set to under `name`
    pub fn variable(&self, name: impl Into<String>) -> ScriptedVariable {
        ScriptedVariable {
            name: name.into(),
            state: Arc::clone(&self.state),
        }
    }

    /// Read-only attribute computing `expr` from the stored values
    pub fn response(&self, name: &str, expr: &str) -> Result<ScriptedResponse> {
        Ok(ScriptedResponse {
            expr: self.engine.compile(name, expr)?,
            engine: Arc::clone(&self.engine),
            state: Arc::clone(&self.state),
        })
    }

    /// Attribute that stores its value and reads back through `expr`
    pub fn readback(&self, name: &str, expr: &str) -> Result<ScriptedReadback> {
        Ok(ScriptedReadback {
            variable: self.variable(name),
            response: self.response(name, expr)?,
        })
    }

    /// Register [`variable`](Self::variable) under `name`
    pub fn register_variable(&self, registry: &mut AttributeRegistry, name: &str) {
        registry.register(name, self.variable(name));
    }

    /// Register [`response`](Self::response) under `name`
    pub fn register_response(
        &self,
        registry: &mut AttributeRegistry,
        name: &str,
        expr: &str,
    ) -> Result<()> {
        registry.register(name, self.response(name, expr)?);
        Ok(())
    }

    /// Register [`readback`](Self::readback) under `name`
    pub fn register_readback(
        &self,
        registry: &mut AttributeRegistry,
        name: &str,
        expr: &str,
    ) -> Result<()> {
        registry.register(name, self.readback(name, expr)?);
        Ok(())
    }

    /// Value currently stored under `name`
    pub fn stored(&self, name: &str) -> Option<AttrValue> {
        lock_state(&self.state).ok()?.get(name).cloned()
    }
}

impl Instrument for ScriptedInstrument {
    fn configure(&mut self) -> Result<()> {
        lock_state(&self.state)?.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        tracing::debug!("Closing scripted instrument ({} stored values)", state.len());
        state.clear();
        Ok(())
    }
}

/// Stored variable of a [`ScriptedInstrument`]
#[derive(Debug)]
pub struct ScriptedVariable {
    name: String,
    state: SharedState,
}

impl Attribute for ScriptedVariable {
    fn set(&self, value: &AttrValue) -> Result<()> {
        lock_state(&self.state)?.insert(self.name.clone(), value.clone());
        Ok(())
    }

    fn get(&self) -> Result<AttrValue> {
        lock_state(&self.state)?
            .get(&self.name)
            .cloned()
            .ok_or_else(|| SweepError::attribute(&self.name, "never set"))
    }
}

/// Computed response of a [`ScriptedInstrument`]
#[derive(Debug)]
pub struct ScriptedResponse {
    expr: CompiledExpr,
    engine: Arc<ScriptEngine>,
    state: SharedState,
}

impl ScriptedResponse {
    fn evaluate(&self, extra: Option<f64>) -> Result<AttrValue> {
        let snapshot: Vec<(String, AttrValue)> = lock_state(&self.state)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let rows = row_count(self.expr.name(), &snapshot)?;
        let mut column = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut bindings: Vec<(&str, f64)> = snapshot
                .iter()
                .filter_map(|(name, value)| value.at(row).map(|v| (name.as_str(), v)))
                .collect();
            if let Some(value) = extra {
                bindings.push(("value", value));
            }
            column.push(self.engine.eval(&self.expr, &bindings)?);
        }
        Ok(AttrValue::from_column(column))
    }
}

impl Attribute for ScriptedResponse {
    fn get(&self) -> Result<AttrValue> {
        self.evaluate(None)
    }
}

/// Parameter with a computed read-back
#[derive(Debug)]
pub struct ScriptedReadback {
    variable: ScriptedVariable,
    response: ScriptedResponse,
}

impl Attribute for ScriptedReadback {
    fn set(&self, value: &AttrValue) -> Result<()> {
        self.variable.set(value)
    }

    fn get(&self) -> Result<AttrValue> {
        let value = self.variable.get()?.first();
        self.response.evaluate(value)
    }
}

fn lock_state(state: &SharedState) -> Result<MutexGuard<'_, HashMap<String, AttrValue>>> {
    state
        .lock()
        .map_err(|e| SweepError::Script(format!("Failed to acquire state lock: {}", e)))
}

fn row_count(name: &str, values: &[(String, AttrValue)]) -> Result<usize> {
    let mut rows: Option<(usize, &str)> = None;
    for (var, value) in values {
        let AttrValue::Vector(v) = value else {
            continue;
        };
        match rows {
            None => rows = Some((v.len(), var.as_str())),
            Some((n, first)) if n != v.len() => {
                return Err(SweepError::attribute(
                    name,
                    format!("'{}' has {} values but '{}' has {}", first, n, var, v.len()),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(rows.map(|(n, _)| n).unwrap_or(1))
}
