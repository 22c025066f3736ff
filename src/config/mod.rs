//! Configuration module for labsweep
//!
//! An experiment is described by a TOML file:
//!
//! ```toml
//! [sweep]
//! batch_size = 1000
//!
//! [[sweep.variables]]
//! name = "x0"
//! skip_if_unchanged = true
//! domain = { range = { start = 0, stop = 3, step = 1 } }
//!
//! [[sweep.variables]]
//! name = "x1"
//! domain = { linspace = { start = -10, stop = 10, num = 1000 } }
//!
//! [[responses]]
//! name = "y"
//! expr = "x0 * x1 + noise(0.5)"
//!
//! [parameters]
//! p1 = 1
//! pause = 0.1
//!
//! [readback]
//! p1 = "value * 2.0"
//!
//! [output]
//! folder_name = "demo"
//! file_name = "data.txt"
//! ```
//!
//! Parameter order in `[parameters]` is kept and is the order of the data
//! file header.
//!
//! # Output Location
//!
//! Without an explicit `base_path`, results go to the platform data
//! directory:
//! - **Linux**: `~/.local/share/labsweep/`
//! - **macOS**: `~/Library/Application Support/labsweep/`
//! - **Windows**: `%APPDATA%\labsweep\`

pub mod settings;

pub use settings::*;

use crate::backend::{AttributeRegistry, IoMode};
use crate::error::{Result, SweepError};
use crate::experiment::ExperimentBuilder;
use crate::scripting::ScriptedInstrument;
use crate::session::{OutputLayout, DEFAULT_LOG_FILE_NAME};
use crate::types::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory name under the platform data directory
pub const APP_DIR_NAME: &str = "labsweep";

/// Default data file name
pub const DEFAULT_FILE_NAME: &str = "data.txt";

/// Largest number of settings a single domain may expand to
pub const MAX_DOMAIN_POINTS: usize = 10_000_000;

/// Default root for results when no `base_path` is configured
pub fn default_base_path() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_DIR_NAME))
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    1
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.to_string()
}

fn default_log_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

// ==================== Sweep ====================

/// How a variable's settings are generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainSpec {
    /// Explicit list
    Values(Vec<f64>),
    /// `start, start + step, ...` up to but excluding `stop`
    Range { start: f64, stop: f64, step: f64 },
    /// `num` evenly spaced points from `start` to `stop` inclusive
    Linspace { start: f64, stop: f64, num: usize },
}

impl DomainSpec {
    /// Expand into the list of settings
    pub fn expand(&self) -> Result<Vec<f64>> {
        match *self {
            DomainSpec::Values(ref values) => Ok(values.clone()),
            DomainSpec::Range { start, stop, step } => {
                if step == 0.0 || !step.is_finite() {
                    return Err(SweepError::Config(format!(
                        "range step must be a non-zero number, got {}",
                        step
                    )));
                }
                let count = ((stop - start) / step).ceil();
                if !count.is_finite() {
                    return Err(SweepError::Config(format!(
                        "range {}..{} is not finite",
                        start, stop
                    )));
                }
                if count > MAX_DOMAIN_POINTS as f64 {
                    return Err(too_many_points(count));
                }
                let count = count.max(0.0) as usize;
                Ok((0..count).map(|i| start + i as f64 * step).collect())
            }
            DomainSpec::Linspace { num, .. } if num > MAX_DOMAIN_POINTS => {
                Err(too_many_points(num as f64))
            }
            DomainSpec::Linspace { start, stop, num } => match num {
                0 => Ok(Vec::new()),
                1 => Ok(vec![start]),
                _ => {
                    let step = (stop - start) / (num - 1) as f64;
                    Ok((0..num)
                        .map(|i| if i == num - 1 { stop } else { start + i as f64 * step })
                        .collect())
                }
            },
        }
    }
}

fn too_many_points(count: f64) -> SweepError {
    SweepError::Config(format!(
        "domain would have {} points, the limit is {}",
        count, MAX_DOMAIN_POINTS
    ))
}

/// One `[[sweep.variables]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,

    #[serde(default)]
    pub skip_if_unchanged: bool,

    pub domain: DomainSpec,
}

/// `[sweep]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Grid points per iteration
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Overrides `[engine] io_mode` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_mode: Option<IoMode>,

    /// Swept variables, slowest first
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            io_mode: None,
            variables: Vec::new(),
        }
    }
}

/// One `[[responses]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub name: String,

    /// Rhai expression; defaults to the stored value named like the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

// ==================== Output ====================

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Absolute root of all output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,

    /// Sub-folder for data files
    #[serde(default)]
    pub folder_name: String,

    /// Data file name, prefixed with the run ID
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Run log file name under `base_path`
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,

    /// Initial state of the save flag
    #[serde(default = "default_true")]
    pub save: bool,

    /// Append a row to the run log when saving
    #[serde(default = "default_true")]
    pub log: bool,

    /// Extra run log columns
    #[serde(default)]
    pub log_extra: toml::Table,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            folder_name: String::new(),
            file_name: default_file_name(),
            log_file_name: default_log_file_name(),
            save: true,
            log: true,
            log_extra: toml::Table::new(),
        }
    }
}

impl OutputConfig {
    /// Resolve the output layout
    pub fn layout(&self) -> Result<OutputLayout> {
        let base = match &self.base_path {
            Some(path) => path.clone(),
            None => default_base_path().ok_or_else(|| {
                SweepError::Config("Could not determine data directory".to_string())
            })?,
        };
        Ok(
            OutputLayout::new(base, self.folder_name.clone(), self.file_name.clone())?
                .with_log_file_name(self.log_file_name.clone()),
        )
    }
}

// ==================== Experiment File ====================

/// A complete experiment description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub responses: Vec<ResponseConfig>,

    /// Parameters in declared order
    #[serde(default)]
    pub parameters: toml::Table,

    /// Read-back expression per parameter
    #[serde(default)]
    pub readback: BTreeMap<String, String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub viewer: ViewerSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl ExperimentConfig {
    /// Load an experiment file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SweepError::Config(format!("Failed to read experiment file {:?}: {}", path, e))
        })?;
        Self::parse(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Parse an experiment description
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SweepError::Config(format!("Failed to parse experiment: {}", e)))
    }

    /// Save the experiment file to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SweepError::Config(format!("Failed to create experiment directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SweepError::Config(format!("Failed to serialize experiment: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            SweepError::Config(format!("Failed to write experiment file {:?}: {}", path, e))
        })
    }

    /// Effective engine settings, with the sweep's I/O mode applied
    pub fn engine_settings(&self) -> EngineSettings {
        let mut settings = self.engine.clone();
        if let Some(mode) = self.sweep.io_mode {
            settings.io_mode = mode;
        }
        settings
    }

    /// Parameters in declared order
    pub fn parameter_values(&self) -> Result<Vec<(String, ParamValue)>> {
        self.parameters
            .iter()
            .map(|(name, value)| Ok((name.clone(), param_value(name, value)?)))
            .collect()
    }

    /// Prepare an experiment backed by a [`ScriptedInstrument`].
    ///
    /// Every variable is a stored value, every response a Rhai expression,
    /// and every parameter with a `[readback]` entry is bound so it reads back
    /// through its expression. The consumer is left for the caller.
    pub fn to_builder(&self) -> Result<ExperimentBuilder> {
        let instrument = ScriptedInstrument::new();
        let mut registry = AttributeRegistry::new();
        let mut builder = ExperimentBuilder::new().batch_size(self.sweep.batch_size);

        for variable in &self.sweep.variables {
            let domain = variable
                .domain
                .expand()
                .map_err(|e| e.with_context(format!("variable '{}'", variable.name)))?;
            instrument.register_variable(&mut registry, &variable.name);
            builder = builder.variable(variable.name.clone(), domain, variable.skip_if_unchanged);
        }

        for response in &self.responses {
            let expr = response.expr.as_deref().unwrap_or(&response.name);
            instrument.register_response(&mut registry, &response.name, expr)?;
            builder = builder.response(response.name.clone());
        }

        for name in self.readback.keys() {
            if !self.parameters.contains_key(name) {
                return Err(SweepError::Config(format!(
                    "read-back given for unknown parameter '{}'",
                    name
                )));
            }
        }
        for (name, value) in self.parameter_values()? {
            if let Some(expr) = self.readback.get(&name) {
                instrument.register_readback(&mut registry, &name, expr)?;
            }
            builder = builder.parameter(name, value);
        }

        match self.output.layout() {
            Ok(layout) => builder = builder.output(layout),
            Err(e) if self.output.save => return Err(e),
            Err(e) => tracing::debug!("No output location ({}), saving unavailable", e),
        }
        for (key, value) in &self.output.log_extra {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            builder = builder.log_extra(key.clone(), value);
        }

        Ok(builder
            .registry(registry)
            .instrument(instrument)
            .settings(self.engine_settings())
            .save(self.output.save)
            .log_runs(self.output.log))
    }
}

fn param_value(name: &str, value: &toml::Value) -> Result<ParamValue> {
    match value {
        toml::Value::Integer(i) => Ok(ParamValue::Number(*i as f64)),
        toml::Value::Float(f) => Ok(ParamValue::Number(*f)),
        toml::Value::Boolean(b) => Ok(ParamValue::Bool(*b)),
        toml::Value::String(s) => Ok(ParamValue::Text(s.clone())),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(i) => Ok(*i as f64),
                toml::Value::Float(f) => Ok(*f),
                _ => Err(SweepError::Config(format!(
                    "parameter '{}' must be a list of numbers",
                    name
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(ParamValue::List),
        other => Err(SweepError::Config(format!(
            "parameter '{}' has unsupported type {}",
            name,
            other.type_str()
        ))),
    }
}
