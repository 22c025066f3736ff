//! Sweep definition and grid enumeration
//!
//! A sweep is a list of independent variables, each with a finite domain of
//! settings. The engine walks the Cartesian product of all domains with the
//! last variable varying fastest, pulling a fixed number of grid points per
//! iteration.
//!
//! # Example
//!
//! ```
//! use labsweep::sweep::SweepSpec;
//!
//! let spec = SweepSpec::new(
//!     vec!["x0".into(), "x1".into()],
//!     vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]],
//!     vec![true, false],
//!     2,
//! )
//! .unwrap();
//!
//! let mut grid = spec.grid();
//! assert_eq!(grid.next_batch(2), Some(vec![vec![0.0, 10.0], vec![0.0, 20.0]]));
//! ```

pub mod grid;

pub use grid::GridEnumerator;

use crate::error::{Result, SweepError};
use std::collections::HashSet;

/// Immutable description of the swept variables
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    variables: Vec<String>,
    domains: Vec<Vec<f64>>,
    skip_if_unchanged: Vec<bool>,
    batch_size: usize,
}

impl SweepSpec {
    /// Create a validated sweep.
    ///
    /// An empty `skip_if_unchanged` list means no variable is skipped. A
    /// batch size of zero is raised to one.
    pub fn new(
        variables: Vec<String>,
        domains: Vec<Vec<f64>>,
        skip_if_unchanged: Vec<bool>,
        batch_size: usize,
    ) -> Result<Self> {
        if variables.len() != domains.len() {
            return Err(SweepError::Config(format!(
                "{} variables but {} domains",
                variables.len(),
                domains.len()
            )));
        }

        let skip_if_unchanged = if skip_if_unchanged.is_empty() {
            vec![false; variables.len()]
        } else {
            skip_if_unchanged
        };
        if skip_if_unchanged.len() != variables.len() {
            return Err(SweepError::Config(format!(
                "{} variables but {} skip-if-unchanged flags",
                variables.len(),
                skip_if_unchanged.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &variables {
            if !seen.insert(name.as_str()) {
                return Err(SweepError::Config(format!(
                    "variable '{}' is declared more than once",
                    name
                )));
            }
        }

        Ok(Self {
            variables,
            domains,
            skip_if_unchanged,
            batch_size: batch_size.max(1),
        })
    }

    /// Variable names in declared order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Domains in declared order
    pub fn domains(&self) -> &[Vec<f64>] {
        &self.domains
    }

    /// Skip-if-unchanged flags in declared order
    pub fn skip_flags(&self) -> &[bool] {
        &self.skip_if_unchanged
    }

    /// Grid points generated and measured per iteration
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Length of the fastest-varying domain.
    ///
    /// This is the number of points on one plot line. A sweep without
    /// variables counts as a single-point line.
    pub fn innermost_len(&self) -> usize {
        self.domains.last().map(Vec::len).unwrap_or(1)
    }

    /// Total number of grid points
    pub fn total_points(&self) -> usize {
        self.domains
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(d.len()))
    }

    /// Start a fresh enumeration of the grid
    pub fn grid(&self) -> GridEnumerator {
        GridEnumerator::new(self.domains.clone())
    }
}
