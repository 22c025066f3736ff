//! Error handling for labsweep
//!
//! This module defines the error type shared by the sweep engine, the
//! attribute I/O layer and the persistence writers, plus a Result alias.
//!
//! Configuration problems are reported before a run starts. Everything an
//! attribute raises during a run propagates unchanged to the caller of
//! [`Experiment::measure`](crate::experiment::Experiment::measure).

use thiserror::Error;

/// Main error type for labsweep operations
#[derive(Error, Debug)]
pub enum SweepError {
    /// Invalid sweep, parameter, or output configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An instrument attribute failed to set or get a value
    #[error("Attribute '{name}' failed: {message}")]
    Attribute { name: String, message: String },

    /// A getter returned a vector whose length disagrees with the batch
    #[error("Shape mismatch for '{name}': expected {expected} values, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Errors related to Rhai script compilation or evaluation
    #[error("Script error: {0}")]
    Script(String),

    /// A threaded-mode worker did not answer within the configured timeout
    #[error("Timeout waiting for {pending} attribute worker(s)")]
    WorkerTimeout { pending: usize },

    /// A threaded-mode worker thread exited while a request was outstanding
    #[error("Attribute worker '{0}' disconnected")]
    WorkerDisconnected(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Errors raised by the visualization consumer
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SweepError>,
    },
}

impl SweepError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SweepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an attribute failure
    pub fn attribute(name: impl Into<String>, message: impl Into<String>) -> Self {
        SweepError::Attribute {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        SweepError::Script(err.to_string())
    }

    /// Whether this error (or the error it wraps) is a configuration error
    pub fn is_config(&self) -> bool {
        match self {
            SweepError::Config(_) => true,
            SweepError::WithContext { source, .. } => source.is_config(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::Serialization(err.to_string())
    }
}

/// Result type alias for labsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SweepError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SweepError::from_rhai_error(e).with_context(f()))
    }
}
