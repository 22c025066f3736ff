//! # labsweep: Concurrent Measurement Orchestration
//!
//! A parameter-sweep engine for lab instruments. An experiment walks the
//! Cartesian grid of its swept variables a batch at a time, sets each
//! variable on its instrument, reads every response, streams the samples to
//! a live viewer and finally writes a tab-delimited data file plus a run log
//! entry.
//!
//! ## Architecture
//!
//! - **Sweep**: Grid enumeration with the last variable varying fastest
//! - **Backend**: Instrument attributes, driven inline or by one worker
//!   thread per attribute
//! - **Control**: Stop/pause/save commands over a crossbeam channel
//! - **Stream**: Labeled batches and line breaks sent to a visualization
//!   consumer (process, thread, or channel)
//! - **Session**: Run identity, the data file writer and the run log
//! - **Scripting**: Rhai-backed instruments for hardware-free experiments
//!
//! ## Output Location
//!
//! Experiment files default their output to the platform data directory
//! under `labsweep`:
//!
//! - **Linux**: `~/.local/share/labsweep/`
//! - **macOS**: `~/Library/Application Support/labsweep/`
//! - **Windows**: `%APPDATA%\labsweep\`
//!
//! ## Example
//!
//! ```no_run
//! use labsweep::config::ExperimentConfig;
//! use labsweep::control::spawn_stdin_listener;
//!
//! fn main() -> labsweep::Result<()> {
//!     let config = ExperimentConfig::load("demos/example.toml")?;
//!     let mut experiment = config.to_builder()?.build()?;
//!
//!     if let Some(handle) = experiment.control_handle() {
//!         spawn_stdin_listener(handle)?;
//!     }
//!     experiment.run()
//! }
//! ```

pub mod backend;
pub mod config;
pub mod control;
pub mod error;
pub mod experiment;
pub mod scripting;
pub mod session;
pub mod stream;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use backend::{Attribute, AttributeRegistry, Instrument, IoMode};
pub use config::{EngineSettings, ExperimentConfig};
pub use control::{ControlEvent, ControlHandle};
pub use error::{Result, SweepError};
pub use experiment::{Experiment, ExperimentBuilder, ResultTable};
pub use stream::{PlotMessage, VisualizationConsumer};
pub use sweep::SweepSpec;
pub use types::{AttrValue, ParamValue, SampleBatch};
