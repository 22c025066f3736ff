//! Test experiment builders

use labsweep::backend::{AttributeRegistry, SimulatedAttribute, SimulatedPattern};
use labsweep::ExperimentBuilder;
use std::sync::Arc;
use std::time::Duration;

/// Deterministic two-variable sweep: `x0` in {0, 1}, `x1` in {10, 20, 30},
/// with `x1_read` echoing the `x1` instrument and a constant `level`
pub struct SweepBuilder {
    batch_size: usize,
    latency: Option<Duration>,
    skip: bool,
}

impl Default for SweepBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepBuilder {
    pub fn new() -> Self {
        Self {
            batch_size: 3,
            latency: None,
            skip: true,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Delay every attribute call
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn skip_if_unchanged(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn build(self) -> ExperimentBuilder {
        let with_latency = |attr: SimulatedAttribute| match self.latency {
            Some(latency) => attr.with_latency(latency),
            None => attr,
        };

        let x1 = Arc::new(with_latency(SimulatedAttribute::recorder()));
        let mut registry = AttributeRegistry::new();
        registry.register("x0", with_latency(SimulatedAttribute::recorder()));
        registry.register_shared("x1", x1.clone());
        registry.register_shared("x1_read", x1);
        registry.register(
            "level",
            with_latency(SimulatedAttribute::new(SimulatedPattern::Constant(0.5))),
        );

        ExperimentBuilder::new()
            .variable("x0", vec![0.0, 1.0], self.skip)
            .variable("x1", vec![10.0, 20.0, 30.0], self.skip)
            .response("x1_read")
            .response("level")
            .batch_size(self.batch_size)
            .registry(registry)
    }
}
