//! Run parameters and their instrument read-back

use crate::backend::AttributeRegistry;
use crate::error::{Result, SweepError};
use crate::types::{AttrValue, ParamValue};
use std::time::Duration;

/// Name of the reserved parameter holding the set-to-get delay in seconds
pub const PAUSE_PARAMETER: &str = "pause";

/// Ordered parameters applied once before a run
///
/// A parameter whose name is bound in the attribute registry is pushed to
/// the instrument and read back; any other parameter is simply stored and
/// reads back as itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: Vec<(String, ParamValue)>,
    read: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a parameter, keeping its original position if it already exists
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Append `pause = 0` unless a pause is already set
    pub fn ensure_pause(&mut self) {
        if self.get(PAUSE_PARAMETER).is_none() {
            self.values
                .push((PAUSE_PARAMETER.to_string(), ParamValue::Number(0.0)));
        }
    }

    /// Value as set
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        lookup(&self.values, name)
    }

    /// Value as read back after [`apply`](Self::apply)
    pub fn read_value(&self, name: &str) -> Option<&ParamValue> {
        lookup(&self.read, name)
    }

    /// All parameters as set, in order
    pub fn values(&self) -> &[(String, ParamValue)] {
        &self.values
    }

    /// All read-back values, in order
    pub fn read_back(&self) -> &[(String, ParamValue)] {
        &self.read
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no parameter is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Push bound parameters to their attributes and record read-backs.
    ///
    /// Setter errors propagate. A bound attribute that cannot be read
    /// reports its set value.
    pub fn apply(&mut self, registry: &AttributeRegistry) -> Result<()> {
        let mut read = Vec::with_capacity(self.values.len());
        for (name, value) in &self.values {
            let Some(attribute) = registry.get(name) else {
                read.push((name.clone(), value.clone()));
                continue;
            };

            let attr_value = to_attr_value(name, value)?;
            attribute.set(&attr_value)?;
            let read_value = match attribute.get() {
                Ok(v) => ParamValue::from(v),
                Err(e) => {
                    tracing::debug!("Parameter {} has no read-back ({}), using set value", name, e);
                    value.clone()
                }
            };
            tracing::debug!("Parameter {} = {} (read {})", name, value, read_value);
            read.push((name.clone(), read_value));
        }
        self.read = read;
        Ok(())
    }

    /// Delay between setting variables and reading responses.
    ///
    /// Taken from the read-back `pause` value (the set value before
    /// [`apply`](Self::apply)); zero when absent or not a positive number.
    /// A pause too long for a [`Duration`] is a configuration error.
    pub fn pause_duration(&self) -> Result<Duration> {
        let seconds = self
            .read_value(PAUSE_PARAMETER)
            .or_else(|| self.get(PAUSE_PARAMETER))
            .and_then(ParamValue::as_f64)
            .unwrap_or(0.0);
        if !seconds.is_finite() || seconds <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(seconds).map_err(|e| {
            SweepError::Config(format!("pause of {} seconds is invalid: {}", seconds, e))
        })
    }

    /// Header lines for the data file.
    ///
    /// Every parameter as set, then a `(Read)` entry for each read-back that
    /// differs, then the completion flag.
    pub fn header_entries(&self, completed: bool) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        for (name, read) in &self.read {
            if !self.get(name).is_some_and(|set| same_value(set, read)) {
                entries.push((format!("{} (Read)", name), read.to_string()));
            }
        }

        entries.push((
            "completed".to_string(),
            if completed { "True" } else { "False" }.to_string(),
        ));
        entries
    }
}

/// Equality where a flag equals its numeric reading (`true == 1`)
fn same_value(set: &ParamValue, read: &ParamValue) -> bool {
    match (set, read) {
        (ParamValue::Bool(b), ParamValue::Number(n))
        | (ParamValue::Number(n), ParamValue::Bool(b)) => *n == if *b { 1.0 } else { 0.0 },
        _ => set == read,
    }
}

fn lookup<'a>(entries: &'a [(String, ParamValue)], name: &str) -> Option<&'a ParamValue> {
    entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn to_attr_value(name: &str, value: &ParamValue) -> Result<AttrValue> {
    match value {
        ParamValue::Number(v) => Ok(AttrValue::Scalar(*v)),
        ParamValue::Bool(b) => Ok(AttrValue::Scalar(if *b { 1.0 } else { 0.0 })),
        ParamValue::List(v) => Ok(AttrValue::Vector(v.clone())),
        ParamValue::Text(_) => Err(SweepError::Config(format!(
            "parameter '{}' is bound to an attribute but is not numeric",
            name
        ))),
    }
}
