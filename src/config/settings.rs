//! Engine tuning settings
//!
//! These settings control how the measurement loop schedules attribute I/O
//! and how long it waits on the visualization consumer. They live in the
//! `[engine]` and `[viewer]` sections of an experiment file; every field has
//! a default.
//!
//! # Timeouts
//!
//! - **worker_timeout_ms**: bound on one threaded-mode phase (all sets or all
//!   gets). Unset means wait forever.
//! - **consumer_poll_interval_ms**: how often the consumer is checked while
//!   the engine waits for it to exit.
//! - **consumer_exit_timeout_ms**: after this long a process consumer is
//!   killed. Defaults to 30 s; `0` means wait forever.

use crate::backend::IoMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default consumer poll interval in milliseconds
pub const DEFAULT_CONSUMER_POLL_MS: u64 = 50;

/// Default consumer exit timeout in milliseconds
pub const DEFAULT_CONSUMER_EXIT_TIMEOUT_MS: u64 = 30_000;

fn default_consumer_poll_ms() -> u64 {
    DEFAULT_CONSUMER_POLL_MS
}

fn default_consumer_exit_timeout_ms() -> Option<u64> {
    Some(DEFAULT_CONSUMER_EXIT_TIMEOUT_MS)
}

/// Scheduling and timeout settings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Inline or threaded attribute I/O
    #[serde(default)]
    pub io_mode: IoMode,

    /// Threaded-mode phase timeout
    #[serde(default)]
    pub worker_timeout_ms: Option<u64>,

    /// Consumer liveness poll interval
    #[serde(default = "default_consumer_poll_ms")]
    pub consumer_poll_interval_ms: u64,

    /// Consumer exit timeout
    #[serde(default = "default_consumer_exit_timeout_ms")]
    pub consumer_exit_timeout_ms: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            io_mode: IoMode::default(),
            worker_timeout_ms: None,
            consumer_poll_interval_ms: DEFAULT_CONSUMER_POLL_MS,
            consumer_exit_timeout_ms: Some(DEFAULT_CONSUMER_EXIT_TIMEOUT_MS),
        }
    }
}

impl EngineSettings {
    /// Set the I/O mode
    pub fn with_io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = mode;
        self
    }

    /// Set the threaded-mode phase timeout
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Threaded-mode phase timeout
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_ms.map(Duration::from_millis)
    }

    /// Consumer liveness poll interval (at least one millisecond)
    pub fn consumer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_interval_ms.max(1))
    }

    /// Consumer exit timeout; `None` when waiting forever
    pub fn consumer_exit_timeout(&self) -> Option<Duration> {
        self.consumer_exit_timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

/// Which visualization consumer the CLI starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerMode {
    /// Separate viewer process fed over stdin
    #[default]
    Process,
    /// In-process viewer thread
    Thread,
    /// No visualization
    None,
}

/// `[viewer]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Consumer kind
    #[serde(default)]
    pub mode: ViewerMode,

    /// Program and arguments for process mode; defaults to `<this exe> view`
    #[serde(default)]
    pub command: Vec<String>,

    /// Where the viewer writes its summary when saving
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
}
