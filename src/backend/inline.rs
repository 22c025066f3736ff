//! Sequential attribute I/O on the measurement thread

use super::attribute::SharedAttribute;
use super::coordinator::{assemble_responses, SkipTracker};
use crate::error::Result;
use crate::types::AttrValue;

/// Calls each attribute in declared order, one at a time
pub struct InlineCoordinator {
    variable_names: Vec<String>,
    setters: Vec<SharedAttribute>,
    response_names: Vec<String>,
    getters: Vec<SharedAttribute>,
    tracker: SkipTracker,
}

impl InlineCoordinator {
    /// Create a coordinator over already resolved attributes
    pub fn new(
        variable_names: Vec<String>,
        setters: Vec<SharedAttribute>,
        response_names: Vec<String>,
        getters: Vec<SharedAttribute>,
        tracker: SkipTracker,
    ) -> Self {
        Self {
            variable_names,
            setters,
            response_names,
            getters,
            tracker,
        }
    }

    /// Set every variable that needs it; returns the number of set calls
    pub fn set_variables(&mut self, batch: &[Vec<f64>]) -> Result<usize> {
        let plan = self.tracker.plan(batch);
        let mut calls = 0;
        for ((name, setter), value) in self.variable_names.iter().zip(&self.setters).zip(plan) {
            match value {
                Some(value) => {
                    setter.set(&value)?;
                    calls += 1;
                }
                None => tracing::trace!("Skipping unchanged variable {}", name),
            }
        }
        Ok(calls)
    }

    /// Get every response in declared order
    pub fn get_responses(&mut self, rows: usize) -> Result<Vec<Vec<f64>>> {
        let values = self
            .getters
            .iter()
            .map(|getter| getter.get())
            .collect::<Result<Vec<AttrValue>>>()?;
        assemble_responses(&self.response_names, values, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FnAttribute, SimulatedAttribute, SimulatedPattern};
    use crate::error::SweepError;
    use std::sync::Arc;

    #[test]
    fn test_set_then_get_in_order() {
        let x = Arc::new(SimulatedAttribute::recorder());
        let mut coordinator = InlineCoordinator::new(
            vec!["x".into()],
            vec![x.clone()],
            vec!["y".into()],
            vec![x.clone()],
            SkipTracker::new(vec![false]),
        );

        coordinator
            .set_variables(&[vec![1.0], vec![2.0], vec![3.0]])
            .unwrap();
        let responses = coordinator.get_responses(3).unwrap();
        assert_eq!(responses, vec![vec![1.0, 2.0, 3.0]]);
        assert_eq!(x.history(), vec![AttrValue::Vector(vec![1.0, 2.0, 3.0])]);
    }

    #[test]
    fn test_getter_error_propagates() {
        let failing: SharedAttribute = Arc::new(FnAttribute::getter(|| {
            Err(SweepError::attribute("dmm", "overload"))
        }));
        let mut coordinator = InlineCoordinator::new(
            vec![],
            vec![],
            vec!["dmm".into()],
            vec![failing],
            SkipTracker::new(vec![]),
        );

        let err = coordinator.get_responses(1).unwrap_err();
        assert!(matches!(err, SweepError::Attribute { .. }));
    }

    #[test]
    fn test_scalar_response_broadcast() {
        let getter: SharedAttribute =
            Arc::new(SimulatedAttribute::new(SimulatedPattern::Constant(5.0)));
        let mut coordinator = InlineCoordinator::new(
            vec![],
            vec![],
            vec!["c".into()],
            vec![getter],
            SkipTracker::new(vec![]),
        );
        assert_eq!(coordinator.get_responses(2).unwrap(), vec![vec![5.0, 5.0]]);
    }
}
