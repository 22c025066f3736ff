//! Result accumulation

use crate::types::SampleBatch;
use serde::{Deserialize, Serialize};

/// Grows the result table one batch at a time, in arrival order
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    batches: usize,
}

impl ResultAssembler {
    /// Create an assembler for `columns` (variables then responses)
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            batches: 0,
        }
    }

    /// Append every row of `batch`
    pub fn append(&mut self, batch: SampleBatch) {
        self.batches += 1;
        self.rows.extend(batch.into_rows());
    }

    /// Batches appended so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Rows appended so far
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Hand over the table, or `None` if nothing was appended
    pub fn finalize(self) -> Option<ResultTable> {
        if self.batches == 0 {
            return None;
        }
        Some(ResultTable {
            columns: self.columns,
            rows: self.rows,
        })
    }
}

/// Finalized measurement results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ResultTable {
    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in measurement order
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of a column by name
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}
