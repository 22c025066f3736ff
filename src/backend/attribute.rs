//! Attribute trait for instrument-bound variables and responses
//!
//! Every swept variable, measured response and bound parameter resolves to an
//! [`Attribute`]: something that can be set to a value and/or read back. The
//! engine never talks to instrument drivers directly.
//!
//! Names are resolved once, through an [`AttributeRegistry`], when a
//! coordinator or parameter set is built.

use crate::error::{Result, SweepError};
use crate::types::AttrValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Unified interface for instrument attributes
///
/// Implementations must be `Send + Sync`: in threaded mode each attribute is
/// driven from its own worker thread. Errors are not retried by the engine.
///
/// # Example
///
/// ```ignore
/// struct Voltage { dac: Dac }
///
/// impl Attribute for Voltage {
///     fn set(&self, value: &AttrValue) -> Result<()> {
///         self.dac.write(value.first().unwrap_or(0.0))
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Attribute: Send + Sync {
    /// Apply a value.
    ///
    /// Receives a scalar for a single-row batch and one value per row otherwise.
    fn set(&self, value: &AttrValue) -> Result<()> {
        let _ = value;
        Err(SweepError::Config("attribute is read-only".to_string()))
    }

    /// Read the current value.
    ///
    /// Vectors must carry one value per row of the active batch.
    fn get(&self) -> Result<AttrValue> {
        Err(SweepError::Config("attribute is write-only".to_string()))
    }
}

/// Shared handle to an attribute
pub type SharedAttribute = Arc<dyn Attribute>;

/// Lifecycle hooks for a physical instrument
///
/// `configure` runs before the experiment starts; `close` runs during
/// teardown, before the process exits.
pub trait Instrument: Send {
    /// Bring the instrument into a known state
    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close, restore, or reset the instrument
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An attribute that simply remembers the last value it was given
///
/// This is how a parameter without a custom setter/getter behaves.
#[derive(Debug, Default)]
pub struct StoredAttribute {
    value: Mutex<Option<AttrValue>>,
}

impl StoredAttribute {
    /// Create an empty stored attribute
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stored attribute with an initial value
    pub fn with_value(value: impl Into<AttrValue>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }

    /// Last stored value
    pub fn value(&self) -> Option<AttrValue> {
        self.value.lock().ok().and_then(|v| v.clone())
    }
}

impl Attribute for StoredAttribute {
    fn set(&self, value: &AttrValue) -> Result<()> {
        let mut slot = self
            .value
            .lock()
            .map_err(|_| SweepError::Channel("stored attribute lock poisoned".to_string()))?;
        *slot = Some(value.clone());
        Ok(())
    }

    fn get(&self) -> Result<AttrValue> {
        self.value()
            .ok_or_else(|| SweepError::Config("stored attribute has no value yet".to_string()))
    }
}

type SetFn = dyn Fn(&AttrValue) -> Result<()> + Send + Sync;
type GetFn = dyn Fn() -> Result<AttrValue> + Send + Sync;

/// An attribute built from closures
///
/// Handy for wiring existing driver calls into the registry.
#[derive(Default)]
pub struct FnAttribute {
    setter: Option<Box<SetFn>>,
    getter: Option<Box<GetFn>>,
}

impl FnAttribute {
    /// Create an attribute with neither capability
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute with only a setter
    pub fn setter<F>(f: F) -> Self
    where
        F: Fn(&AttrValue) -> Result<()> + Send + Sync + 'static,
    {
        Self::new().with_setter(f)
    }

    /// Attribute with only a getter
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Result<AttrValue> + Send + Sync + 'static,
    {
        Self::new().with_getter(f)
    }

    /// Add a setter
    pub fn with_setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&AttrValue) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(f));
        self
    }

    /// Add a getter
    pub fn with_getter<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<AttrValue> + Send + Sync + 'static,
    {
        self.getter = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for FnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAttribute")
            .field("settable", &self.setter.is_some())
            .field("gettable", &self.getter.is_some())
            .finish()
    }
}

impl Attribute for FnAttribute {
    fn set(&self, value: &AttrValue) -> Result<()> {
        match &self.setter {
            Some(f) => f(value),
            None => Err(SweepError::Config("attribute has no setter".to_string())),
        }
    }

    fn get(&self) -> Result<AttrValue> {
        match &self.getter {
            Some(f) => f(),
            None => Err(SweepError::Config("attribute has no getter".to_string())),
        }
    }
}

/// Name to attribute lookup table
#[derive(Clone, Default)]
pub struct AttributeRegistry {
    attributes: HashMap<String, SharedAttribute>,
}

impl AttributeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an attribute, replacing any previous binding
    pub fn register(&mut self, name: impl Into<String>, attribute: impl Attribute + 'static) {
        self.attributes.insert(name.into(), Arc::new(attribute));
    }

    /// Bind `name` to an already shared attribute
    pub fn register_shared(&mut self, name: impl Into<String>, attribute: SharedAttribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, name: impl Into<String>, attribute: impl Attribute + 'static) -> Self {
        self.register(name, attribute);
        self
    }

    /// Look up an attribute
    pub fn get(&self, name: &str) -> Option<SharedAttribute> {
        self.attributes.get(name).cloned()
    }

    /// Whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Resolve every name, failing on the first unknown one
    pub fn resolve(&self, names: &[String], role: &str) -> Result<Vec<SharedAttribute>> {
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    SweepError::Config(format!("no attribute bound for {} '{}'", role, name))
                })
            })
            .collect()
    }

    /// Number of bound names
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.attributes.keys().collect();
        names.sort();
        f.debug_struct("AttributeRegistry")
            .field("names", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_attribute_round_trip() {
        let attr = StoredAttribute::new();
        assert!(attr.get().is_err());

        attr.set(&AttrValue::Scalar(4.0)).unwrap();
        assert_eq!(attr.get().unwrap(), AttrValue::Scalar(4.0));
    }

    #[test]
    fn test_fn_attribute_capabilities() {
        let attr = FnAttribute::getter(|| Ok(AttrValue::Scalar(1.5)));
        assert_eq!(attr.get().unwrap(), AttrValue::Scalar(1.5));
        assert!(attr.set(&AttrValue::Scalar(0.0)).is_err());
    }

    #[test]
    fn test_registry_resolve_reports_unknown_name() {
        let registry = AttributeRegistry::new().with("x0", StoredAttribute::new());
        assert_eq!(registry.len(), 1);

        let ok = registry.resolve(&["x0".to_string()], "variable").unwrap();
        assert_eq!(ok.len(), 1);

        let err = registry
            .resolve(&["x0".to_string(), "x9".to_string()], "variable")
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("variable 'x9'"));
    }
}
