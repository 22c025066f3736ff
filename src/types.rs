//! Core data types for labsweep
//!
//! This module contains the values that flow between the sweep engine and
//! the instrument attributes, and the per-iteration sample block.
//!
//! # Main Types
//!
//! - [`AttrValue`] - What a setter receives or a getter returns: one scalar,
//!   or one value per row of the active batch
//! - [`ParamValue`] - A parameter value as written in configuration and in
//!   the data file header
//! - [`SampleBatch`] - One iteration's rows, variables followed by responses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value exchanged with an instrument attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// A single value
    Scalar(f64),
    /// One value per row of the active batch
    Vector(Vec<f64>),
}

impl AttrValue {
    /// Build the value a setter receives for one column of a batch.
    ///
    /// A single-row column is passed as a scalar.
    pub fn from_column(column: Vec<f64>) -> Self {
        if column.len() == 1 {
            AttrValue::Scalar(column[0])
        } else {
            AttrValue::Vector(column)
        }
    }

    /// Number of values carried
    pub fn len(&self) -> usize {
        match self {
            AttrValue::Scalar(_) => 1,
            AttrValue::Vector(v) => v.len(),
        }
    }

    /// Returns true for an empty vector
    pub fn is_empty(&self) -> bool {
        matches!(self, AttrValue::Vector(v) if v.is_empty())
    }

    /// Value at `row`; a scalar answers for every row
    pub fn at(&self, row: usize) -> Option<f64> {
        match self {
            AttrValue::Scalar(v) => Some(*v),
            AttrValue::Vector(v) => v.get(row).copied(),
        }
    }

    /// First value, if any
    pub fn first(&self) -> Option<f64> {
        self.at(0)
    }

    /// Expand into a column of exactly `rows` values.
    ///
    /// Scalars are broadcast. Returns `None` if a vector has the wrong length.
    pub fn into_column(self, rows: usize) -> Option<Vec<f64>> {
        match self {
            AttrValue::Scalar(v) => Some(vec![v; rows]),
            AttrValue::Vector(v) if v.len() == rows => Some(v),
            AttrValue::Vector(_) => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Scalar(value)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(values: Vec<f64>) -> Self {
        AttrValue::Vector(values)
    }
}

/// A parameter value
///
/// Parameters are set once before a run. Numbers can be bound to instrument
/// attributes; text and booleans are always stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// List of numbers (only produced by a vector read-back)
    List(Vec<f64>),
    /// Free text
    Text(String),
}

impl ParamValue {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<AttrValue> for ParamValue {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Scalar(v) => ParamValue::Number(v),
            AttrValue::Vector(v) => ParamValue::List(v),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One iteration's worth of samples
///
/// Row-major: each row holds the variable settings followed by the response
/// values, in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    rows: Vec<Vec<f64>>,
}

impl SampleBatch {
    /// Join variable rows with response columns.
    ///
    /// `responses` is column-major and every column must have one value per
    /// settings row.
    pub fn from_parts(settings: Vec<Vec<f64>>, responses: &[Vec<f64>]) -> Self {
        let rows = settings
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row.extend(responses.iter().map(|col| col[i]));
                row
            })
            .collect();
        Self { rows }
    }

    /// Build directly from rows
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Number of rows (observations)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns, taken from the first row
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Copy of column `idx` over `range` of rows
    pub fn column_slice(&self, idx: usize, range: std::ops::Range<usize>) -> Vec<f64> {
        self.rows[range].iter().map(|row| row[idx]).collect()
    }

    /// Copy of column `idx`
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.column_slice(idx, 0..self.rows.len())
    }

    /// Consume into rows
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}
