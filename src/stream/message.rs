//! Messages exchanged with the visualization consumer
//!
//! The protocol is a FIFO of [`PlotMessage`]s. Sentinels steer the consumer;
//! data messages carry one line segment of samples, labeled by column.
//! Process consumers receive the same messages as newline-delimited JSON.

use crate::error::Result;
use crate::types::SampleBatch;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One column of a labeled batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Samples for consecutive rows of one plot line, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledBatch {
    pub columns: Vec<LabeledColumn>,
}

impl LabeledBatch {
    /// Label rows `range` of `batch` with `names`, one name per column
    pub fn from_segment(names: &[String], batch: &SampleBatch, range: Range<usize>) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| LabeledColumn {
                name: name.clone(),
                values: batch.column_slice(idx, range.clone()),
            })
            .collect();
        Self { columns }
    }

    /// Values of the named column
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Column names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Returns true if the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Message on the visualization queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotMessage {
    /// No more messages will follow
    Stop,
    /// Following data starts a new plot line
    NewLine,
    /// Flip the consumer's save flag
    ToggleSave,
    /// Samples for the current line
    Data(LabeledBatch),
}

impl PlotMessage {
    /// Whether this is a sentinel rather than data
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, PlotMessage::Data(_))
    }

    /// Encode as a single JSON line, newline included
    pub fn to_json_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one JSON line
    pub fn from_json_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
