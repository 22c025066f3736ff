//! Append-only run log
//!
//! One tab-delimited row per saved run. The first entry written to a new log
//! also writes its keys as the header row.

use crate::error::{Result, ResultExt, SweepError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ordered key/value row for the run log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Create an empty entry; empty entries are not logged
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Append a field, keeping insertion order
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.fields.push((key.into(), value.to_string()));
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the entry has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tab-joined keys
    pub fn header_line(&self) -> String {
        self.fields
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }

    /// Tab-joined values
    pub fn value_line(&self) -> String {
        self.fields
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// Shared run log file
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Log at `path`; nothing is touched until the first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry.
    ///
    /// Returns false without touching the file when the entry is empty.
    pub fn append(&self, entry: &LogEntry) -> Result<bool> {
        if entry.is_empty() {
            tracing::debug!("Empty log entry, skipping run log");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !self.path.exists() {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .map_err(SweepError::from)
                .with_context(|| format!("creating run log {}", self.path.display()))?;
            writeln!(file, "{}", entry.header_line())?;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(SweepError::from)
            .with_context(|| format!("opening run log {}", self.path.display()))?;
        writeln!(file, "{}", entry.value_line())?;
        tracing::debug!("Appended run log entry to {}", self.path.display());
        Ok(true)
    }
}
