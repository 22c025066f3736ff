//! Attribute I/O coordination
//!
//! The coordinator applies one batch of variable settings and then reads
//! every response. It comes in two interchangeable strategies, chosen once
//! per run through [`IoMode`]:
//!
//! - [`IoMode::Inline`] - calls attributes one after another on the
//!   measurement thread ([`InlineCoordinator`])
//! - [`IoMode::Threaded`] - hands each call to a persistent per-attribute
//!   worker thread and waits for all of them ([`WorkerPool`])
//!
//! Both strategies share the skip-if-unchanged bookkeeping ([`SkipTracker`])
//! and the response assembly ([`assemble_responses`]). In both, all variable
//! sets complete before any response is read.

use super::attribute::AttributeRegistry;
use super::inline::InlineCoordinator;
use super::worker::WorkerPool;
use crate::error::{Result, SweepError};
use crate::sweep::SweepSpec;
use crate::types::AttrValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How attribute calls are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// One call at a time on the measurement thread
    #[default]
    Inline,
    /// One worker thread per attribute, calls overlap.
    ///
    /// Best-effort: worker scheduling order is not guaranteed, only that all
    /// sets finish before any get starts.
    Threaded,
}

/// Remembers the previous batch to decide which set calls can be skipped
#[derive(Debug, Clone)]
pub struct SkipTracker {
    flags: Vec<bool>,
    previous: Option<Vec<Vec<f64>>>,
}

impl SkipTracker {
    /// Create a tracker with one flag per variable
    pub fn new(flags: Vec<bool>) -> Self {
        Self {
            flags,
            previous: None,
        }
    }

    /// Work out what to send to each variable for `batch`.
    ///
    /// Returns one entry per variable: `None` when the set can be skipped,
    /// otherwise the value to apply. The batch is remembered either way.
    pub fn plan(&mut self, batch: &[Vec<f64>]) -> Vec<Option<AttrValue>> {
        let plan = self
            .flags
            .iter()
            .enumerate()
            .map(|(i, &skip)| {
                if skip && self.unchanged(batch, i) {
                    None
                } else {
                    Some(AttrValue::from_column(
                        batch.iter().map(|row| row[i]).collect(),
                    ))
                }
            })
            .collect();
        self.previous = Some(batch.to_vec());
        plan
    }

    fn unchanged(&self, batch: &[Vec<f64>], column: usize) -> bool {
        match &self.previous {
            Some(prev) if prev.len() == batch.len() => prev
                .iter()
                .zip(batch)
                .all(|(old, new)| old[column] == new[column]),
            _ => false,
        }
    }
}

/// Turn raw getter results into response columns of exactly `rows` values.
///
/// Scalars are broadcast; a vector of any other length is a shape error.
pub fn assemble_responses(
    names: &[String],
    values: Vec<AttrValue>,
    rows: usize,
) -> Result<Vec<Vec<f64>>> {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| {
            let actual = value.len();
            value.into_column(rows).ok_or_else(|| SweepError::ShapeMismatch {
                name: name.clone(),
                expected: rows,
                actual,
            })
        })
        .collect()
}

/// Attribute I/O coordinator for one run
pub enum IoCoordinator {
    /// Sequential calls on the caller's thread
    Inline(InlineCoordinator),
    /// Worker-per-attribute pool
    Threaded(WorkerPool),
}

impl IoCoordinator {
    /// Resolve every variable and response and build the chosen strategy
    pub fn new(
        mode: IoMode,
        spec: &SweepSpec,
        responses: &[String],
        registry: &AttributeRegistry,
        worker_timeout: Option<Duration>,
    ) -> Result<Self> {
        let setters = registry.resolve(spec.variables(), "variable")?;
        let getters = registry.resolve(responses, "response")?;
        let tracker = SkipTracker::new(spec.skip_flags().to_vec());

        Ok(match mode {
            IoMode::Inline => IoCoordinator::Inline(InlineCoordinator::new(
                spec.variables().to_vec(),
                setters,
                responses.to_vec(),
                getters,
                tracker,
            )),
            IoMode::Threaded => IoCoordinator::Threaded(WorkerPool::spawn(
                spec.variables().to_vec(),
                setters,
                responses.to_vec(),
                getters,
                tracker,
                worker_timeout,
            )?),
        })
    }

    /// Which strategy is active
    pub fn mode(&self) -> IoMode {
        match self {
            IoCoordinator::Inline(_) => IoMode::Inline,
            IoCoordinator::Threaded(_) => IoMode::Threaded,
        }
    }

    /// Apply one batch of settings (rows of variable values).
    ///
    /// Returns the number of set calls actually made.
    pub fn set_variables(&mut self, batch: &[Vec<f64>]) -> Result<usize> {
        match self {
            IoCoordinator::Inline(c) => c.set_variables(batch),
            IoCoordinator::Threaded(c) => c.set_variables(batch),
        }
    }

    /// Read every response for a batch of `rows` rows, column-major
    pub fn get_responses(&mut self, rows: usize) -> Result<Vec<Vec<f64>>> {
        match self {
            IoCoordinator::Inline(c) => c.get_responses(rows),
            IoCoordinator::Threaded(c) => c.get_responses(rows),
        }
    }
}
