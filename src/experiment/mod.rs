//! The measurement engine
//!
//! An [`Experiment`] ties the pieces together: it walks the sweep grid a
//! batch at a time, drives the attribute coordinator, streams samples to the
//! visualization consumer, honors stop/pause/save commands and finally
//! persists the results.
//!
//! # Lifecycle
//!
//! 1. [`ExperimentBuilder::build`] validates the sweep, configures the
//!    instruments, applies the parameters and resolves every attribute.
//! 2. [`Experiment::measure`] runs the loop until the grid is exhausted or a
//!    stop is observed, then stops the consumer.
//! 3. [`Experiment::save`] writes the run log entry and the data file if the
//!    save flag is on.
//!
//! [`Experiment::run`] is measure followed by save, and
//! [`Experiment::run_to_exit`] additionally tears down and exits the process.
//!
//! # Example
//!
//! ```
//! use labsweep::backend::SimulatedAttribute;
//! use labsweep::experiment::ExperimentBuilder;
//!
//! let mut experiment = ExperimentBuilder::new()
//!     .variable("x", vec![0.0, 1.0, 2.0], false)
//!     .response("y")
//!     .batch_size(2)
//!     .attribute("x", SimulatedAttribute::recorder())
//!     .attribute("y", SimulatedAttribute::new(labsweep::backend::SimulatedPattern::Constant(1.0)))
//!     .build()
//!     .unwrap();
//!
//! experiment.measure().unwrap();
//! assert!(experiment.completed());
//! assert_eq!(experiment.results().unwrap().len(), 3);
//! ```

pub mod parameters;
pub mod results;

pub use parameters::{ParameterSet, PAUSE_PARAMETER};
pub use results::{ResultAssembler, ResultTable};

use crate::backend::{Attribute, AttributeRegistry, Instrument, IoCoordinator, IoMode};
use crate::config::EngineSettings;
use crate::control::{ControlHandle, FlowControl};
use crate::error::{Result, SweepError};
use crate::session::{
    format_timestamp, write_data_file, DataHeader, LogEntry, OutputLayout, RunLog, RunSession,
};
use crate::stream::{NullConsumer, StreamingBatcher, VisualizationConsumer};
use crate::sweep::{GridEnumerator, SweepSpec};
use crate::types::{ParamValue, SampleBatch};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::time::Duration;

/// Custom run log entry
pub type LogEntryFn = Box<dyn Fn(&Experiment) -> LogEntry + Send>;

/// Step-by-step construction of an [`Experiment`]
pub struct ExperimentBuilder {
    variables: Vec<String>,
    domains: Vec<Vec<f64>>,
    skip_flags: Vec<bool>,
    batch_size: usize,
    responses: Vec<String>,
    parameters: ParameterSet,
    registry: AttributeRegistry,
    settings: EngineSettings,
    output: Option<OutputLayout>,
    save: bool,
    log_runs: bool,
    log_extra: Vec<(String, String)>,
    consumer: Option<Box<dyn VisualizationConsumer>>,
    instruments: Vec<Box<dyn Instrument>>,
}

impl Default for ExperimentBuilder {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            domains: Vec::new(),
            skip_flags: Vec::new(),
            batch_size: 1,
            responses: Vec::new(),
            parameters: ParameterSet::new(),
            registry: AttributeRegistry::new(),
            settings: EngineSettings::default(),
            output: None,
            save: false,
            log_runs: true,
            log_extra: Vec::new(),
            consumer: None,
            instruments: Vec::new(),
        }
    }
}

impl ExperimentBuilder {
    /// Start with an empty sweep, inline I/O, no output and no consumer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a swept variable; the first one added varies slowest
    pub fn variable(
        mut self,
        name: impl Into<String>,
        domain: Vec<f64>,
        skip_if_unchanged: bool,
    ) -> Self {
        self.variables.push(name.into());
        self.domains.push(domain);
        self.skip_flags.push(skip_if_unchanged);
        self
    }

    /// Grid points per iteration
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Add a measured response
    pub fn response(mut self, name: impl Into<String>) -> Self {
        self.responses.push(name.into());
        self
    }

    /// Set one parameter
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Replace all parameters
    pub fn parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = parameters;
        self
    }

    /// Replace the attribute registry
    pub fn registry(mut self, registry: AttributeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Bind one attribute
    pub fn attribute(mut self, name: impl Into<String>, attribute: impl Attribute + 'static) -> Self {
        self.registry.register(name, attribute);
        self
    }

    /// Engine settings
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shorthand for changing only the I/O mode
    pub fn io_mode(mut self, mode: IoMode) -> Self {
        self.settings.io_mode = mode;
        self
    }

    /// Where results are written
    pub fn output(mut self, layout: OutputLayout) -> Self {
        self.output = Some(layout);
        self
    }

    /// Initial value of the save flag
    pub fn save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    /// Whether saving also appends to the run log
    pub fn log_runs(mut self, log_runs: bool) -> Self {
        self.log_runs = log_runs;
        self
    }

    /// Extra column for the default run log entry
    pub fn log_extra(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.log_extra.push((key.into(), value.to_string()));
        self
    }

    /// Visualization consumer (none by default)
    pub fn consumer(mut self, consumer: impl VisualizationConsumer + 'static) -> Self {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Already boxed visualization consumer
    pub fn boxed_consumer(mut self, consumer: Box<dyn VisualizationConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Instrument to configure before the run and close at teardown
    pub fn instrument(mut self, instrument: impl Instrument + 'static) -> Self {
        self.instruments.push(Box::new(instrument));
        self
    }

    /// Validate everything and prepare the run
    pub fn build(mut self) -> Result<Experiment> {
        let spec = SweepSpec::new(self.variables, self.domains, self.skip_flags, self.batch_size)?;

        let mut seen: HashSet<&str> = spec.variables().iter().map(String::as_str).collect();
        for name in &self.responses {
            if !seen.insert(name.as_str()) {
                return Err(SweepError::Config(format!(
                    "column '{}' is declared more than once",
                    name
                )));
            }
        }

        if self.save && self.output.is_none() {
            return Err(SweepError::Config(
                "saving is enabled but no output location is configured".to_string(),
            ));
        }

        for instrument in &mut self.instruments {
            instrument.configure()?;
        }
        self.parameters.ensure_pause();
        self.parameters.apply(&self.registry)?;
        let pause = self.parameters.pause_duration()?;

        let coordinator = IoCoordinator::new(
            self.settings.io_mode,
            &spec,
            &self.responses,
            &self.registry,
            self.settings.worker_timeout(),
        )?;
        let (control, handle) = FlowControl::new(self.save);

        Ok(Experiment {
            spec,
            responses: self.responses,
            parameters: self.parameters,
            pause,
            coordinator,
            control,
            handle: Some(handle),
            consumer: self
                .consumer
                .unwrap_or_else(|| Box::new(NullConsumer)),
            settings: self.settings,
            output: self.output,
            log_runs: self.log_runs,
            log_extra: self.log_extra,
            log_entry_fn: None,
            instruments: self.instruments,
            session: RunSession::start(),
            results: None,
            measured: false,
        })
    }
}

/// One measurement run
pub struct Experiment {
    spec: SweepSpec,
    responses: Vec<String>,
    parameters: ParameterSet,
    pause: Duration,
    coordinator: IoCoordinator,
    control: FlowControl,
    handle: Option<ControlHandle>,
    consumer: Box<dyn VisualizationConsumer>,
    settings: EngineSettings,
    output: Option<OutputLayout>,
    log_runs: bool,
    log_extra: Vec<(String, String)>,
    log_entry_fn: Option<LogEntryFn>,
    instruments: Vec<Box<dyn Instrument>>,
    session: RunSession,
    results: Option<ResultTable>,
    measured: bool,
}

impl Experiment {
    /// Handle for posting stop/pause/save commands.
    ///
    /// Returns `None` once [`measure`](Self::measure) has started.
    pub fn control_handle(&self) -> Option<ControlHandle> {
        self.handle.clone()
    }

    /// Sweep definition
    pub fn spec(&self) -> &SweepSpec {
        &self.spec
    }

    /// Response names in order
    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    /// Result columns: variables then responses
    pub fn columns(&self) -> Vec<String> {
        self.spec
            .variables()
            .iter()
            .chain(&self.responses)
            .cloned()
            .collect()
    }

    /// Parameters as set
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Parameters as read back from the instruments
    pub fn parameters_read(&self) -> &[(String, ParamValue)] {
        self.parameters.read_back()
    }

    /// Attribute scheduling mode
    pub fn io_mode(&self) -> IoMode {
        self.coordinator.mode()
    }

    /// Run identifier
    pub fn run_id(&self) -> &str {
        self.session.run_id()
    }

    /// Run start time
    pub fn start_time(&self) -> DateTime<Local> {
        self.session.start_time()
    }

    /// Save time, if results were saved
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.session.end_time()
    }

    /// Whether the sweep reached the end of the grid
    pub fn completed(&self) -> bool {
        self.session.completed()
    }

    /// Measured results, `None` if no iteration completed
    pub fn results(&self) -> Option<&ResultTable> {
        self.results.as_ref()
    }

    /// Current value of the save flag
    pub fn save_enabled(&self) -> bool {
        self.control.save_enabled()
    }

    /// Data file location for this run
    pub fn data_path(&self) -> Option<std::path::PathBuf> {
        self.output.as_ref().map(|o| o.data_path(self.run_id()))
    }

    /// Replace the default run log entry
    pub fn set_log_entry<F>(&mut self, f: F)
    where
        F: Fn(&Experiment) -> LogEntry + Send + 'static,
    {
        self.log_entry_fn = Some(Box::new(f));
    }

    /// Entry that [`save`](Self::save) appends to the run log
    pub fn log_entry(&self) -> LogEntry {
        if let Some(f) = &self.log_entry_fn {
            return f(self);
        }
        let mut entry = LogEntry::new()
            .with("runID", self.run_id())
            .with("start_time", format_timestamp(&self.start_time()))
            .with(
                "end_time",
                self.end_time()
                    .map(|t| format_timestamp(&t))
                    .unwrap_or_default(),
            )
            .with("completed", if self.completed() { "True" } else { "False" });
        for (key, value) in &self.log_extra {
            entry.push(key.clone(), value);
        }
        entry
    }

    /// Run the sweep.
    ///
    /// Ends when the grid is exhausted or a stop is observed. The consumer is
    /// always sent a final stop. If an attribute fails, the rows measured so
    /// far are still saved (when saving is on) before the error is returned.
    pub fn measure(&mut self) -> Result<()> {
        if self.measured {
            return Err(SweepError::Config(
                "an experiment can only be measured once".to_string(),
            ));
        }
        self.measured = true;
        // Without our own handle, dropping every external one can end a pause
        self.handle = None;

        let columns = self.columns();
        let mut batcher = self
            .consumer
            .sender()
            .map(|tx| StreamingBatcher::new(columns.clone(), self.spec.innermost_len(), tx));
        let mut assembler = ResultAssembler::new(columns);
        let mut grid = self.spec.grid();
        let pause = self.pause;

        tracing::info!(
            "Starting run {}: {} variable(s), {} response(s), {} grid point(s), {:?} I/O",
            self.run_id(),
            self.spec.variables().len(),
            self.responses.len(),
            grid.len_hint(),
            self.coordinator.mode()
        );

        let outcome = self.measure_loop(&mut grid, &mut assembler, batcher.as_mut(), pause);

        self.session.set_completed(matches!(outcome, Ok(true)));
        if let Some(batcher) = batcher.as_mut() {
            batcher.stop();
        }
        drop(batcher);
        self.wait_for_consumer();
        self.results = assembler.finalize();

        match outcome {
            Ok(completed) => {
                tracing::info!(
                    "Run {} {} with {} row(s)",
                    self.run_id(),
                    if completed { "completed" } else { "stopped" },
                    self.results.as_ref().map(ResultTable::len).unwrap_or(0)
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Run {} aborted: {}", self.run_id(), e);
                if let Err(save_err) = self.save() {
                    tracing::warn!("Failed to save partial results: {}", save_err);
                }
                Err(e)
            }
        }
    }

    /// The loop proper; returns whether the grid was exhausted
    fn measure_loop(
        &mut self,
        grid: &mut GridEnumerator,
        assembler: &mut ResultAssembler,
        mut batcher: Option<&mut StreamingBatcher>,
        pause: Duration,
    ) -> Result<bool> {
        let mut iteration = 0usize;
        loop {
            let toggles = self.control.poll() + self.control.wait_while_paused();
            forward_save_toggles(batcher.as_deref_mut(), toggles);

            let Some(settings) = grid.next_batch(self.spec.batch_size()) else {
                return Ok(true);
            };

            forward_save_toggles(batcher.as_deref_mut(), self.control.poll());
            if self.control.should_stop() {
                tracing::debug!("Discarding batch of {} point(s) pulled after stop", settings.len());
                return Ok(false);
            }

            self.coordinator.set_variables(&settings)?;
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
            let responses = self.coordinator.get_responses(settings.len())?;

            let samples = SampleBatch::from_parts(settings, &responses);
            if let Some(batcher) = batcher.as_deref_mut() {
                batcher.emit(&samples);
            }
            iteration += 1;
            tracing::debug!(
                "Iteration {}: {} point(s), {} remaining",
                iteration,
                samples.len(),
                grid.remaining()
            );
            assembler.append(samples);
        }
    }

    fn wait_for_consumer(&mut self) {
        let poll = self.settings.consumer_poll_interval();
        let timeout = self.settings.consumer_exit_timeout();
        match self.consumer.wait(poll, timeout) {
            Ok(exit) => tracing::debug!("Consumer '{}' finished: {:?}", self.consumer.name(), exit),
            Err(e) => tracing::warn!("Waiting for consumer '{}' failed: {}", self.consumer.name(), e),
        }
    }

    /// Persist the run log entry and the data file if saving is on
    pub fn save(&mut self) -> Result<()> {
        // Late toggles still count
        self.control.poll();
        if !self.control.save_enabled() {
            tracing::info!("Save disabled, results of run {} not written", self.run_id());
            return Ok(());
        }
        let Some(layout) = self.output.clone() else {
            tracing::warn!("Save enabled but no output location configured");
            return Ok(());
        };

        self.session.mark_end();

        if self.log_runs {
            RunLog::new(layout.log_path()).append(&self.log_entry())?;
        }

        let header = DataHeader::new(
            self.parameters.header_entries(self.completed()),
            self.columns(),
        );
        let rows = self.results.as_ref().map(ResultTable::rows);
        write_data_file(&layout.data_path(self.run_id()), &header, rows)
    }

    /// Measure, then save. A measurement error wins over a save error.
    pub fn run(&mut self) -> Result<()> {
        self.measure()?;
        self.save()
    }

    /// Close every instrument, logging failures
    pub fn close_instruments(&mut self) {
        for instrument in &mut self.instruments {
            if let Err(e) = instrument.close() {
                tracing::warn!("Failed to close instrument: {}", e);
            }
        }
    }

    /// Run, tear down and terminate the process.
    ///
    /// `teardown` runs after the instruments are closed. Worker threads that
    /// may still be blocked in instrument calls are not joined.
    pub fn run_to_exit<F>(mut self, teardown: F) -> !
    where
        F: FnOnce(&mut Experiment),
    {
        let code = match self.run() {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("Experiment failed: {}", e);
                1
            }
        };
        self.close_instruments();
        teardown(&mut self);
        std::process::exit(code)
    }
}

fn forward_save_toggles(batcher: Option<&mut StreamingBatcher>, toggles: usize) {
    if let Some(batcher) = batcher {
        for _ in 0..toggles {
            batcher.toggle_save();
        }
    }
}
